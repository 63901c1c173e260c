//! Browser state snapshots
//!
//! An observable snapshot of the current page for downstream automation
//! consumers. The snapshot is built here and handed off; it is not mutated
//! afterwards.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// Snapshot of the current page
#[derive(Debug, Clone, Serialize)]
pub struct BrowserState {
    /// Current page URL
    pub url: String,
    /// Page title, when the document has one
    pub title: Option<String>,
    /// JPEG screenshot, captured when vision was requested
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
}

impl BrowserState {
    /// Build a snapshot from a live page
    ///
    /// The screenshot is best-effort: a capture failure downgrades the
    /// snapshot to text-only with a warning rather than failing the call.
    pub(crate) async fn capture(page: &Page, use_vision: bool) -> Result<Self> {
        let url = page
            .url()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?
            .unwrap_or_else(|| "about:blank".to_string());

        let title = page
            .evaluate("document.title")
            .await
            .ok()
            .and_then(|v| v.into_value::<String>().ok())
            .filter(|t| !t.is_empty());

        let screenshot = if use_vision {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(80)
                .from_surface(true)
                .build();
            match page.screenshot(params).await {
                Ok(data) => {
                    debug!(bytes = data.len(), "state screenshot captured");
                    Some(data)
                }
                Err(e) => {
                    warn!("state screenshot failed, continuing without: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            url,
            title,
            screenshot,
            captured_at: Utc::now(),
        })
    }

    /// Whether the snapshot carries a screenshot
    pub fn has_vision(&self) -> bool {
        self.screenshot.is_some()
    }

    /// Screenshot as base64, when one was captured
    pub fn screenshot_base64(&self) -> Option<String> {
        self.screenshot.as_ref().map(|data| BASE64.encode(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(screenshot: Option<Vec<u8>>) -> BrowserState {
        BrowserState {
            url: "https://example.com".to_string(),
            title: Some("Example".to_string()),
            screenshot,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_vision() {
        assert!(!snapshot(None).has_vision());
        assert!(snapshot(Some(vec![0xff, 0xd8])).has_vision());
    }

    #[test]
    fn test_screenshot_base64() {
        let state = snapshot(Some(b"hello world".to_vec()));
        assert_eq!(state.screenshot_base64().unwrap(), "aGVsbG8gd29ybGQ=");
        assert!(snapshot(None).screenshot_base64().is_none());
    }

    #[test]
    fn test_serialization_skips_screenshot() {
        let state = snapshot(Some(vec![1, 2, 3]));
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"url\":\"https://example.com\""));
        assert!(json.contains("\"title\":\"Example\""));
        assert!(!json.contains("screenshot"));
    }
}
