use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("launch: {0}")]
    Launch(String),
    #[error("invalid_transition: {0:?} -> {1:?}")]
    InvalidTransition(CaptureState, CaptureState),
    #[error("not_opened")]
    NotOpened,
    #[error("element_not_visible: {0}")]
    ElementNotVisible(String),
    #[error("missing_source: {0}")]
    MissingSource(String),
}

/// Lifecycle of a `PageCapture`. Only moves forward; `Closed` is reachable from
/// any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Uninitialized,
    Opened,
    Captured,
    Extracted,
    Closed,
}

/// What we read off the target element after the screenshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetails {
    pub source: String,
    pub hash: String,
    pub href: Option<String>,
}

/// The record written to the output file. Field order is the on disk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureResult {
    pub id: String,
    pub redirection_url: Option<String>,
    pub img_link: String,
    pub img_url: String,
    pub format: String,
}

impl CaptureResult {
    pub fn new(details: ImageDetails, screenshot_path: &str, format: &str) -> Self {
        CaptureResult {
            id: details.hash,
            redirection_url: details.href,
            img_link: details.source,
            img_url: screenshot_path.into(),
            format: format.into(),
        }
    }
}
