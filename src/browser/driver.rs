//! Page-driving seam.
//!
//! The auth and extraction flows drive pages through this trait instead of
//! the concrete session, so their operation ordering can be asserted with a
//! scripted fake. The live implementation is [`BrowserSession`].

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use chromiumoxide::page::Page;

use super::{BrowserError, BrowserSession};
use crate::humanize::Pacing;

#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;
    async fn current_url(&self) -> Result<String, BrowserError>;
    async fn title(&self) -> Result<String, BrowserError>;
    async fn content(&self) -> Result<String, BrowserError>;
    /// Evaluate a script expected to yield a string or null.
    async fn eval_text(&self, script: &str) -> Result<Option<String>, BrowserError>;
    async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;
    async fn type_into(
        &self,
        selector: &str,
        text: &str,
        pacing: &Pacing,
    ) -> Result<(), BrowserError>;
    async fn move_mouse(&self, x: f64, y: f64) -> Result<(), BrowserError>;
    async fn press_end(&self) -> Result<(), BrowserError>;
    async fn wheel(&self, delta_y: f64) -> Result<(), BrowserError>;
    async fn scroll_height(&self) -> Result<u64, BrowserError>;
    async fn set_cookies(&self, cookies: Vec<CookieParam>) -> Result<(), BrowserError>;
    async fn get_cookies(&self) -> Result<Vec<Cookie>, BrowserError>;
    async fn clear_cookies(&self) -> Result<(), BrowserError>;

    /// The raw CDP page when one exists. Event-listener features are
    /// skipped for drivers without one.
    fn cdp_page(&self) -> Option<&Page> {
        None
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        BrowserSession::navigate(self, url).await
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        BrowserSession::current_url(self).await
    }

    async fn title(&self) -> Result<String, BrowserError> {
        BrowserSession::title(self).await
    }

    async fn content(&self) -> Result<String, BrowserError> {
        BrowserSession::content(self).await
    }

    async fn eval_text(&self, script: &str) -> Result<Option<String>, BrowserError> {
        BrowserSession::evaluate(self, script).await
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        BrowserSession::wait_for_element(self, selector, timeout).await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        BrowserSession::click(self, selector).await
    }

    async fn type_into(
        &self,
        selector: &str,
        text: &str,
        pacing: &Pacing,
    ) -> Result<(), BrowserError> {
        BrowserSession::type_into(self, selector, text, pacing).await
    }

    async fn move_mouse(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        BrowserSession::move_mouse(self, x, y).await
    }

    async fn press_end(&self) -> Result<(), BrowserError> {
        BrowserSession::press_end(self).await
    }

    async fn wheel(&self, delta_y: f64) -> Result<(), BrowserError> {
        BrowserSession::wheel(self, delta_y).await
    }

    async fn scroll_height(&self) -> Result<u64, BrowserError> {
        BrowserSession::scroll_height(self).await
    }

    async fn set_cookies(&self, cookies: Vec<CookieParam>) -> Result<(), BrowserError> {
        BrowserSession::set_cookies(self, cookies).await
    }

    async fn get_cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        BrowserSession::get_cookies(self).await
    }

    async fn clear_cookies(&self) -> Result<(), BrowserError> {
        BrowserSession::clear_cookies(self).await
    }

    fn cdp_page(&self) -> Option<&Page> {
        Some(self.page())
    }
}
