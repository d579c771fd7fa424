//! Profile extraction pipeline.
//!
//! Drives the authenticated page through one profile at a time: normalize
//! the target URL, navigate, force lazy sections to render by scrolling to
//! exhaustion, snapshot the DOM, parse it, then fetch the contact-info
//! overlay. Parsing itself is pure and lives in [`parser`].

pub mod parser;

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserError, PageDriver};
use crate::humanize::Pacing;
use crate::models::{ContactInfo, ProfileRecord};

/// Upper bound on scroll passes for a single profile. Pages that keep
/// growing (embedded feeds, ads) must not pin the run.
const MAX_SCROLL_ITERATIONS: u32 = 15;
/// Bound on waiting for the contact overlay dialog to render.
const OVERLAY_TIMEOUT: Duration = Duration::from_secs(5);
/// Cap on buffered API response bodies per profile.
const RESPONSE_CAPTURE_CAP: usize = 64;
/// API responses worth capturing share this URL fragment.
const CAPTURE_URL_FRAGMENT: &str = "graphql";

#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The profile page itself is not served: 404 title or an auth wall.
    #[error("profile unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Expand a target identifier into a canonical profile URL. Accepts a full
/// URL, a scheme-less URL, or a bare public handle.
pub fn normalize_profile_url(target: &str) -> String {
    let target = target.trim();
    if target.starts_with("http") {
        target.to_string()
    } else if target.contains("linkedin.com") {
        format!("https://{target}")
    } else {
        format!(
            "https://www.linkedin.com/in/{}",
            target.trim_matches('/')
        )
    }
}

/// Decides when scrolling has exhausted the page. Pure so the termination
/// rule is testable without a browser.
#[derive(Debug)]
pub struct ScrollTracker {
    last_height: Option<u64>,
    iterations: u32,
    max_iterations: u32,
}

impl ScrollTracker {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            last_height: None,
            iterations: 0,
            max_iterations,
        }
    }

    /// Record a height observation. Returns `true` while scrolling should
    /// continue: the height is still increasing and the pass budget holds.
    pub fn observe(&mut self, height: u64) -> bool {
        self.iterations += 1;
        if self.iterations >= self.max_iterations {
            return false;
        }
        let grew = match self.last_height {
            Some(previous) => height > previous,
            None => true,
        };
        self.last_height = Some(height);
        grew
    }
}

/// Buffers JSON bodies of matching API responses while a profile page
/// loads. Best effort all the way down: a body that cannot be fetched or
/// parsed is dropped, and the buffer stops growing at its cap.
struct ResponseCapture {
    task: JoinHandle<()>,
    buffer: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl ResponseCapture {
    async fn install(page: &Page, url_fragment: &str, cap: usize) -> Result<Self, BrowserError> {
        page.execute(NetworkEnableParams::default())
            .await
            .map_err(|e| BrowserError::CdpFailed(format!("Network.enable: {e}")))?;

        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| BrowserError::CdpFailed(e.to_string()))?;

        let page = page.clone();
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();
        let fragment = url_fragment.to_string();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if !event.response.url.contains(&fragment) {
                    continue;
                }
                if sink.lock().await.len() >= cap {
                    continue;
                }
                let params = GetResponseBodyParams::new(event.request_id.clone());
                let Ok(response) = page.execute(params).await else {
                    continue;
                };
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&response.result.body)
                {
                    sink.lock().await.push(value);
                }
            }
        });

        Ok(Self { task, buffer })
    }

    async fn captured(&self) -> usize {
        self.buffer.lock().await.len()
    }

    fn uninstall(self) {
        self.task.abort();
    }
}

/// Extracts one profile at a time against the shared authenticated session.
pub struct ExtractionPipeline<'a> {
    session: &'a dyn PageDriver,
    pacing: Pacing,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(session: &'a dyn PageDriver, pacing: Pacing) -> Self {
        Self { session, pacing }
    }

    /// Extract a full profile record for one target identifier.
    pub async fn extract(&self, target: &str) -> Result<ProfileRecord, ExtractionError> {
        let url = normalize_profile_url(target);
        info!("Extracting profile {}", url);

        // The capture shadows the whole profile visit; losing it only loses
        // diagnostics, never the extraction.
        let capture = match self.session.cdp_page() {
            Some(page) => {
                match ResponseCapture::install(page, CAPTURE_URL_FRAGMENT, RESPONSE_CAPTURE_CAP)
                    .await
                {
                    Ok(capture) => Some(capture),
                    Err(e) => {
                        warn!("Response capture unavailable: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        let result = self.extract_inner(&url).await;

        if let Some(capture) = capture {
            debug!("Captured {} API responses for {}", capture.captured().await, url);
            capture.uninstall();
        }

        result
    }

    async fn extract_inner(&self, url: &str) -> Result<ProfileRecord, ExtractionError> {
        self.session.navigate(url).await?;
        self.pacing.settle().await;

        let title = self.session.title().await?;
        let current = self.session.current_url().await?;
        if title.contains("404") {
            return Err(ExtractionError::Unavailable(format!(
                "page not found: {url}"
            )));
        }
        if current.contains("authwall") {
            return Err(ExtractionError::Unavailable(format!(
                "auth wall encountered: {url}"
            )));
        }

        // Lazy sections only render once scrolled into view. A scroll
        // failure degrades to parsing whatever already rendered.
        if let Err(e) = self.exhaust_lazy_content().await {
            warn!("Scrolling aborted early for {}: {}", url, e);
        }

        let html = self.session.content().await?;
        let mut record = parser::parse_profile(&html, url);
        record.contact_info = Some(self.fetch_contact_info(url).await);

        info!("Extracted profile for {}", record.basic.full_name);
        Ok(record)
    }

    /// Scroll until the document height stops growing or the pass budget is
    /// spent. Each pass jumps to the bottom, jitters the wheel, then settles
    /// to give lazy loaders time to fire.
    async fn exhaust_lazy_content(&self) -> Result<(), BrowserError> {
        let mut tracker = ScrollTracker::new(MAX_SCROLL_ITERATIONS);
        loop {
            self.session.press_end().await?;
            self.pacing.pause().await;
            self.session.wheel(-100.0).await?;
            self.session.wheel(300.0).await?;
            self.pacing.settle().await;

            let height = self.session.scroll_height().await?;
            if !tracker.observe(height) {
                debug!("Scroll converged at height {}", height);
                return Ok(());
            }
        }
    }

    /// Visit the contact-info overlay and parse it. Always navigates back to
    /// the profile afterwards, and degrades to an empty record on any
    /// failure so one missing overlay never sinks the profile.
    async fn fetch_contact_info(&self, canonical_url: &str) -> ContactInfo {
        let base = canonical_url.trim_end_matches('/');
        let overlay_url = format!("{base}/overlay/contact-info/");

        let result = self.read_contact_overlay(&overlay_url).await;

        if let Err(e) = self.session.navigate(base).await {
            warn!("Failed to navigate back from contact overlay: {}", e);
        }

        match result {
            Ok(contact) => contact,
            Err(e) => {
                error!("Error parsing contact info overlay: {}", e);
                ContactInfo::default()
            }
        }
    }

    async fn read_contact_overlay(&self, overlay_url: &str) -> Result<ContactInfo, BrowserError> {
        self.session.navigate(overlay_url).await?;
        self.pacing.pause().await;
        self.session
            .wait_for_element(r#"div[role="dialog"], dialog"#, OVERLAY_TIMEOUT)
            .await?;
        self.session
            .wait_for_element("h3", OVERLAY_TIMEOUT)
            .await?;

        let html = self.session.content().await?;
        Ok(parser::parse_contact_info(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
    use std::sync::Mutex as StdMutex;

    /// Scripted driver for one profile visit. Navigation to the contact
    /// overlay fails; everything else succeeds with a fixed page.
    #[derive(Default)]
    struct FlakyOverlayDriver {
        calls: StdMutex<Vec<String>>,
    }

    impl FlakyOverlayDriver {
        fn navigations(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with("navigate:"))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl PageDriver for FlakyOverlayDriver {
        async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
            self.calls.lock().unwrap().push(format!("navigate:{url}"));
            if url.contains("/overlay/contact-info/") {
                Err(BrowserError::NavigationFailed(url.to_string()))
            } else {
                Ok(())
            }
        }

        async fn current_url(&self) -> Result<String, BrowserError> {
            Ok("https://www.linkedin.com/in/jane".to_string())
        }

        async fn title(&self) -> Result<String, BrowserError> {
            Ok("Jane Dev".to_string())
        }

        async fn content(&self) -> Result<String, BrowserError> {
            Ok("<html><body><h1>Jane Dev</h1></body></html>".to_string())
        }

        async fn eval_text(&self, _script: &str) -> Result<Option<String>, BrowserError> {
            Ok(None)
        }

        async fn wait_for_element(
            &self,
            _selector: &str,
            _timeout: Duration,
        ) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn click(&self, _selector: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn type_into(
            &self,
            _selector: &str,
            _text: &str,
            _pacing: &Pacing,
        ) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn move_mouse(&self, _x: f64, _y: f64) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn press_end(&self) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn wheel(&self, _delta_y: f64) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn scroll_height(&self) -> Result<u64, BrowserError> {
            // Constant height so scrolling converges on the second pass.
            Ok(1000)
        }

        async fn set_cookies(&self, _cookies: Vec<CookieParam>) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn get_cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
            Ok(vec![])
        }

        async fn clear_cookies(&self) -> Result<(), BrowserError> {
            Ok(())
        }
    }

    fn test_pacing() -> Pacing {
        Pacing {
            settle_ms: 0..1,
            action_ms: 0..1,
            keystroke_ms: 0..1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn contact_overlay_failure_degrades_and_returns_to_the_profile() {
        let driver = FlakyOverlayDriver::default();
        let pipeline = ExtractionPipeline::new(&driver, test_pacing());

        let record = pipeline
            .extract("https://www.linkedin.com/in/jane")
            .await
            .unwrap();

        // The overlay failure degrades to an empty contact record, distinct
        // from an absent one.
        let contact = record.contact_info.expect("contact info populated");
        assert!(contact.is_empty());

        // The overlay was attempted, and the last navigation went back to
        // the profile itself.
        let navs = driver.navigations();
        assert!(navs
            .iter()
            .any(|n| n.contains("/overlay/contact-info/")));
        assert_eq!(
            navs.last().map(String::as_str),
            Some("navigate:https://www.linkedin.com/in/jane")
        );
    }

    #[test]
    fn full_urls_pass_through_unchanged() {
        assert_eq!(
            normalize_profile_url("https://www.linkedin.com/in/jane-dev/"),
            "https://www.linkedin.com/in/jane-dev/"
        );
    }

    #[test]
    fn schemeless_urls_gain_https() {
        assert_eq!(
            normalize_profile_url("www.linkedin.com/in/jane-dev"),
            "https://www.linkedin.com/in/jane-dev"
        );
    }

    #[test]
    fn bare_handles_expand_to_profile_urls() {
        assert_eq!(
            normalize_profile_url("jane-dev"),
            "https://www.linkedin.com/in/jane-dev"
        );
        assert_eq!(
            normalize_profile_url("  /jane-dev/ "),
            "https://www.linkedin.com/in/jane-dev"
        );
    }

    #[test]
    fn scroll_stops_when_height_converges() {
        let mut tracker = ScrollTracker::new(10);
        assert!(tracker.observe(1000));
        assert!(tracker.observe(2000));
        assert!(!tracker.observe(2000));
    }

    #[test]
    fn scroll_stops_when_height_shrinks() {
        let mut tracker = ScrollTracker::new(10);
        assert!(tracker.observe(1000));
        assert!(!tracker.observe(900));
    }

    #[test]
    fn scroll_respects_the_pass_budget() {
        let mut tracker = ScrollTracker::new(3);
        assert!(tracker.observe(100));
        assert!(tracker.observe(200));
        // Still growing, but the budget is spent.
        assert!(!tracker.observe(300));
    }
}
