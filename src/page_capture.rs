use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    browser_controller::PageDriver,
    types::{CaptureError, CaptureState, ImageDetails},
    utils::{content_hash, create_parent_dir},
};

/// Drives one page through navigate, wait, screenshot and extraction against
/// a single url and selector.
pub struct PageCapture<D: PageDriver> {
    url: String,
    selector: String,
    screenshot_path: PathBuf,
    driver: Option<D>,
    state: CaptureState,
}

impl<D: PageDriver> PageCapture<D> {
    pub fn new(url: &str, selector: &str, screenshot_path: &Path) -> Self {
        PageCapture {
            url: url.into(),
            selector: selector.into(),
            screenshot_path: screenshot_path.to_path_buf(),
            driver: None,
            state: CaptureState::Uninitialized,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Launches the browser. Errors here are fatal to the run and are not
    /// swallowed.
    pub fn open(&mut self, headless: bool, viewport: (u32, u32)) -> anyhow::Result<()> {
        self.transition(CaptureState::Uninitialized, CaptureState::Opened)?;
        let driver = D::launch(headless, viewport).context("could not open browser session")?;
        self.driver = Some(driver);
        self.state = CaptureState::Opened;
        Ok(())
    }

    /// Navigates, waits for the target element and saves a screenshot of it.
    /// Returns the screenshot path, or `None` after logging the failure.
    pub fn capture(&mut self) -> Option<PathBuf> {
        match self.try_capture() {
            Ok(path) => {
                self.state = CaptureState::Captured;
                Some(path)
            }
            Err(e) => {
                error!("error taking screenshot: {:?}", e);
                None
            }
        }
    }

    /// Reads the image source, hashes it and looks up the sibling link.
    /// Refused unless the capture succeeded first.
    pub fn extract_details(&mut self) -> Option<ImageDetails> {
        match self.try_extract() {
            Ok(details) => {
                self.state = CaptureState::Extracted;
                Some(details)
            }
            Err(e) => {
                error!("error getting other details: {:?}", e);
                None
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            debug!("closing browser session for {}", self.url);
            driver.close();
        }
        self.state = CaptureState::Closed;
    }

    fn try_capture(&self) -> anyhow::Result<PathBuf> {
        self.transition(CaptureState::Opened, CaptureState::Captured)?;
        let driver = self.driver()?;

        driver.goto(&self.url)?;
        driver.wait_for_visible(&self.selector)?;
        let png = driver.screenshot_element(&self.selector)?;

        create_parent_dir(&self.screenshot_path)?;
        fs::write(&self.screenshot_path, png).context(format!(
            "could not save screenshot to {:?}",
            self.screenshot_path
        ))?;
        debug!("screenshot of {} saved to {:?}", self.selector, self.screenshot_path);

        Ok(self.screenshot_path.clone())
    }

    fn try_extract(&self) -> anyhow::Result<ImageDetails> {
        self.transition(CaptureState::Captured, CaptureState::Extracted)?;
        let driver = self.driver()?;

        let source = driver
            .image_source(&self.selector)?
            .ok_or_else(|| CaptureError::MissingSource(self.selector.clone()))?;
        let hash = content_hash(&source);
        let href = driver.next_sibling_href(&self.selector)?;

        Ok(ImageDetails { source, hash, href })
    }

    fn driver(&self) -> anyhow::Result<&D> {
        self.driver
            .as_ref()
            .ok_or_else(|| CaptureError::NotOpened.into())
    }

    fn transition(&self, expected: CaptureState, to: CaptureState) -> Result<(), CaptureError> {
        if self.state != expected {
            return Err(CaptureError::InvalidTransition(self.state, to));
        }
        Ok(())
    }
}

impl<D: PageDriver> Drop for PageCapture<D> {
    fn drop(&mut self) {
        self.close();
    }
}
