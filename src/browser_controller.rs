use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::util::Wait;
use headless_chrome::Tab;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::types::CaptureError;

const VISIBLE_FN: &str = r#"function () {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== "hidden" && style.display !== "none";
}"#;

const READY_STATE_JS: &str = "document.readyState";

const SOURCE_FN: &str = "function () { return this.src || null; }";

const SIBLING_HREF_FN: &str = r#"function () {
    const next = this.nextElementSibling;
    return next ? next.getAttribute("href") : null;
}"#;

/// The slice of browser automation the capture workflow relies on.
///
/// Every selector based call re-queries the page, nothing holds on to element
/// handles between calls.
pub trait PageDriver {
    /// Launches a browser and opens a single page sized to `viewport`.
    fn launch(headless: bool, viewport: (u32, u32)) -> Result<Self>
    where
        Self: Sized;

    /// Navigates and returns once the DOM has been parsed. Does not wait for
    /// the network to go quiet.
    fn goto(&self, url: &str) -> Result<()>;

    /// Blocks until `selector` matches an element with a visible, non empty box.
    /// Uses the automation library's default timeout.
    fn wait_for_visible(&self, selector: &str) -> Result<()>;

    /// PNG of the first element matching `selector`, cropped to its box.
    fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>>;

    /// Resolved `src` property of the first match.
    fn image_source(&self, selector: &str) -> Result<Option<String>>;

    /// `href` of the next element sibling of the first match, if any.
    fn next_sibling_href(&self, selector: &str) -> Result<Option<String>>;

    /// Releases the browser. Calling it again is a no-op.
    fn close(&mut self);
}

struct Session {
    browser: Browser,
    tab: Arc<Tab>,
}

pub struct BrowserController {
    session: Option<Session>,
}

impl BrowserController {
    fn tab(&self) -> Result<&Arc<Tab>> {
        match &self.session {
            Some(s) => Ok(&s.tab),
            None => Err(CaptureError::NotOpened.into()),
        }
    }

    fn string_from_js(&self, selector: &str, function: &str) -> Result<Option<String>> {
        let element = self
            .tab()?
            .find_element(selector)
            .context(format!("could not find element {}", selector))?;
        let res = element
            .call_js_fn(function, vec![], false)
            .context(format!("js evaluation failed on {}", selector))?;

        Ok(res.value.and_then(|v| v.as_str().map(String::from)))
    }

    fn kill(pid: u32) -> bool {
        // must run while the child is still unreaped, the pid is ours until then
        let pid = Pid::from_u32(pid);
        let mut s = System::new();
        if s.refresh_process(pid) {
            if let Some(process) = s.process(pid) {
                debug!("browser process {} still alive, killing it", pid);
                return process.kill();
            }
        }
        false
    }
}

impl PageDriver for BrowserController {
    fn launch(headless: bool, viewport: (u32, u32)) -> Result<Self> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let executable = default_executable().map_err(CaptureError::Launch)?;
        let options = LaunchOptions::default_builder()
            .path(Some(executable))
            .headless(headless)
            .window_size(Some(viewport))
            .idle_browser_timeout(Duration::from_secs(45))
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| CaptureError::Launch(e.to_string()))?;
        let browser = Browser::new(options).context("browser launching error")?;
        let tab = browser.new_tab().context("could not create new tab")?;
        // the window size includes browser chrome when headful, pin the page itself
        tab.call_method(device_metrics(viewport))
            .context("could not set viewport")?;

        info!(
            "browser launched (headless: {}, viewport: {}x{})",
            headless, viewport.0, viewport.1
        );

        Ok(BrowserController {
            session: Some(Session { browser, tab }),
        })
    }

    fn goto(&self, url: &str) -> Result<()> {
        debug!("navigating to {}", url);
        let tab = self.tab()?;
        tab.navigate_to(url)
            .context(format!("could not navigate to {}", url))?;

        Wait::default()
            .until(|| {
                let res = tab.evaluate(READY_STATE_JS, false).ok()?;
                match res.value.as_ref().and_then(|v| v.as_str()) {
                    Some(state) if dom_loaded(state) => Some(()),
                    _ => None,
                }
            })
            .map_err(|_| anyhow!("dom of {} never finished loading", url))?;
        Ok(())
    }

    fn wait_for_visible(&self, selector: &str) -> Result<()> {
        let tab = self.tab()?;
        debug!("waiting for {} to be visible", selector);

        Wait::default()
            .until(|| {
                let element = tab.find_element(selector).ok()?;
                let res = element.call_js_fn(VISIBLE_FN, vec![], false).ok()?;
                match res.value.and_then(|v| v.as_bool()) {
                    Some(true) => Some(()),
                    _ => None,
                }
            })
            .map_err(|_| CaptureError::ElementNotVisible(selector.into()))?;
        Ok(())
    }

    fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>> {
        let element = self
            .tab()?
            .find_element(selector)
            .context(format!("could not find element {}", selector))?;
        let png = element
            .capture_screenshot(CaptureScreenshotFormatOption::Png)
            .context(format!("screenshot for {} could not be captured", selector))?;
        Ok(png)
    }

    fn image_source(&self, selector: &str) -> Result<Option<String>> {
        self.string_from_js(selector, SOURCE_FN)
    }

    fn next_sibling_href(&self, selector: &str) -> Result<Option<String>> {
        self.string_from_js(selector, SIBLING_HREF_FN)
    }

    fn close(&mut self) {
        let session = match self.session.take() {
            Some(s) => s,
            None => return,
        };
        debug!("closing browser...");
        if let Some(pid) = session.browser.get_process_id() {
            Self::kill(pid);
        }
        drop(session);
    }
}

/// Same override puppeteer's `setViewport` sends.
fn device_metrics(viewport: (u32, u32)) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width: viewport.0,
        height: viewport.1,
        device_scale_factor: 1.0,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}

/// `interactive` is DOMContentLoaded, `complete` is past it.
fn dom_loaded(ready_state: &str) -> bool {
    matches!(ready_state, "interactive" | "complete")
}

impl Drop for BrowserController {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unopened_controller_refuses_page_calls() {
        let mut c = BrowserController { session: None };
        let err = c.goto("https://example.com").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::NotOpened)
        ));
        // closing something that was never opened is fine, twice
        c.close();
        c.close();
    }

    #[test]
    fn dom_counts_as_loaded_from_interactive_on() {
        assert!(!dom_loaded("loading"));
        assert!(dom_loaded("interactive"));
        assert!(dom_loaded("complete"));
        assert!(!dom_loaded(""));
    }

    #[test]
    fn viewport_override_is_unscaled_desktop() {
        let m = device_metrics((1200, 1200));
        assert_eq!(m.width, 1200);
        assert_eq!(m.height, 1200);
        assert_eq!(m.device_scale_factor, 1.0);
        assert!(!m.mobile);
        assert!(m.scale.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn kills_a_live_unreaped_child() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        assert!(BrowserController::kill(child.id()));
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    #[ignore = "needs chrome"]
    fn launches_and_closes() -> anyhow::Result<()> {
        let mut c = BrowserController::launch(true, (1200, 1200))?;
        c.goto("data:text/html,<p>hi</p>")?;
        c.close();
        assert!(c.tab().is_err());
        Ok(())
    }

    /*
    RUST_LOG=debug cargo test --lib -- browser_controller --ignored
     */
    #[test]
    #[ignore = "needs chrome"]
    fn page_viewport_is_pinned_in_headful_mode() -> anyhow::Result<()> {
        let c = BrowserController::launch(false, (1200, 1200))?;
        c.goto("data:text/html,<p>hi</p>")?;
        let size = c
            .tab()?
            .evaluate("`${window.innerWidth}x${window.innerHeight}`", false)?;
        assert_eq!(size.value.unwrap().as_str(), Some("1200x1200"));
        Ok(())
    }

    #[test]
    #[ignore = "needs chrome"]
    fn goto_returns_while_network_stays_busy() -> anyhow::Result<()> {
        let c = BrowserController::launch(true, (1200, 1200))?;
        let html = "<p>hi</p><script>setInterval(() => fetch('https://example.com/?' + Date.now()), 50)</script>";
        c.goto(&format!("data:text/html,{}", html.replace(' ', "%20")))?;
        Ok(())
    }
}
