use std::{marker::PhantomData, path::PathBuf};

use crate::{
    browser_controller::PageDriver,
    page_capture::PageCapture,
    types::CaptureResult,
    utils::{
        write_json_pretty, BANNER_FORMAT, OUTPUT_PATH, SCREENSHOT_PATH, TARGET_SELECTOR,
        TARGET_URL, VIEWPORT,
    },
};

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct RunnerOptions {
    // page holding the banner
    #[builder(default = "self.default_url()")]
    url: String,
    // css selector of the banner image
    #[builder(default = "self.default_selector()")]
    selector: String,
    // where the element screenshot is written, also reported as img_url
    #[builder(default = "PathBuf::from(SCREENSHOT_PATH)")]
    screenshot_path: PathBuf,
    // where the json record is written
    #[builder(default = "PathBuf::from(OUTPUT_PATH)")]
    output_path: PathBuf,
    // label stored in the record's format field
    #[builder(default = "self.default_format()")]
    format: String,
    #[builder(default = "true")]
    headless: bool,
    #[builder(default = "VIEWPORT")]
    viewport: (u32, u32),
}

impl RunnerOptions {
    pub fn default_builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::default()
    }
}

impl RunnerOptionsBuilder {
    fn default_url(&self) -> String {
        TARGET_URL.into()
    }
    fn default_selector(&self) -> String {
        TARGET_SELECTOR.into()
    }
    fn default_format(&self) -> String {
        BANNER_FORMAT.into()
    }
}

/// Top level driver: one capture, one record, one cleanup.
pub struct Runner<D: PageDriver> {
    options: RunnerOptions,
    _driver: PhantomData<D>,
}

impl<D: PageDriver> Runner<D> {
    pub fn new(options: RunnerOptions) -> Self {
        Runner {
            options,
            _driver: PhantomData,
        }
    }

    /// Runs the whole capture. Failing to open the browser or to write the
    /// record is an error. Capture or extraction failures are logged and yield
    /// `Ok(None)` without touching the output file. The browser is closed on
    /// every path.
    pub fn run(&self) -> anyhow::Result<Option<CaptureResult>> {
        let o = &self.options;
        info!("capturing {} on {}", o.selector, o.url);

        let mut page = PageCapture::<D>::new(&o.url, &o.selector, &o.screenshot_path);
        let res = self.run_with(&mut page);
        page.close();
        res
    }

    fn run_with(&self, page: &mut PageCapture<D>) -> anyhow::Result<Option<CaptureResult>> {
        let o = &self.options;
        page.open(o.headless, o.viewport)?;

        let screenshot = match page.capture() {
            Some(p) => p,
            None => {
                warn!("capture failed, skipping extraction");
                return Ok(None);
            }
        };
        let details = match page.extract_details() {
            Some(d) => d,
            None => return Ok(None),
        };

        let record = CaptureResult::new(details, &screenshot.to_string_lossy(), &o.format);
        write_json_pretty(&o.output_path, &record)?;
        info!("JSON data saved to {:?}", o.output_path);

        Ok(Some(record))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_the_fixed_target() {
        let o = RunnerOptions::default_builder().build().unwrap();
        assert_eq!(o.url, TARGET_URL);
        assert_eq!(o.selector, "img.uk-cover");
        assert_eq!(o.screenshot_path, PathBuf::from("screenshot.png"));
        assert_eq!(o.output_path, PathBuf::from("data.json"));
        assert_eq!(o.format, "Left Side Banner");
        assert!(o.headless);
        assert_eq!(o.viewport, (1200, 1200));
    }

    #[test]
    fn setters_override_defaults() {
        let o = RunnerOptions::default_builder()
            .url("http://localhost:8080/")
            .output_path(PathBuf::from("out/data.json"))
            .headless(false)
            .build()
            .unwrap();
        assert_eq!(o.url, "http://localhost:8080/");
        assert_eq!(o.output_path, PathBuf::from("out/data.json"));
        assert!(!o.headless);
        assert_eq!(o.selector, TARGET_SELECTOR);
    }
}
