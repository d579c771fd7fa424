//! Browser session management
//!
//! Owns the Chrome process and the single page every other component works
//! against. The session is the only entity allowed to tear the browser down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetTimezoneOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EnableParams as FetchEnableParams, EventAuthRequired,
    EventRequestPaused,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, Cookie, CookieParam,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::BrowserError;
use crate::config::ProxyConfig;
use crate::humanize::Pacing;

/// Pinned browser identity. Matching UA, locale and timezone keeps the
/// fingerprint consistent across runs that reuse a persisted session.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const TIMEZONE: &str = "America/New_York";

/// Configuration for the browser session.
#[derive(Debug, Clone)]
pub struct BrowserSessionConfig {
    /// Run without a visible window.
    pub headless: bool,
    /// Apply anti-detection launch flags.
    pub stealth: bool,
    /// Upstream proxy; credentials are answered over CDP.
    pub proxy: Option<ProxyConfig>,
    /// Per-operation timeout in seconds.
    pub timeout_secs: u64,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            headless: false,
            stealth: true,
            proxy: None,
            timeout_secs: 60,
            window_width: 1280,
            window_height: 720,
        }
    }
}

/// A live browser with one page used for the whole scraping sequence.
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Page,
    alive: Arc<AtomicBool>,
    handler_task: Option<JoinHandle<()>>,
    auth_pump_task: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl BrowserSession {
    /// Launch Chrome and prepare the main page.
    pub async fn launch(config: BrowserSessionConfig) -> Result<Self, BrowserError> {
        info!(
            "Launching browser (headless: {}, stealth: {})",
            config.headless, config.stealth
        );

        let mut builder = BrowserConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }

        // Required when running as root (Docker, CI).
        builder = builder.no_sandbox();

        if config.stealth {
            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--no-default-browser-check");
        }

        if let Some(ref proxy) = config.proxy {
            info!("Routing traffic through proxy {}", proxy.server_arg());
            builder = builder.arg(format!("--proxy-server={}", proxy.server_arg()));
        }

        builder = builder.window_size(config.window_width, config.window_height);

        let browser_config = builder
            .build()
            .map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // The handler must be polled for the browser to function. When it
        // ends, Chrome has disconnected.
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_handler = alive.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
            warn!("Chrome disconnected (event handler ended)");
            alive_for_handler.store(false, Ordering::Relaxed);
        });

        // Chrome opens with a blank tab; take it as the main page.
        let page = {
            let mut pages = browser
                .pages()
                .await
                .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
            if pages.is_empty() {
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?
            } else {
                let main = pages.remove(0);
                for extra in pages {
                    debug!("Closing extra blank tab");
                    let _ = extra.close().await;
                }
                main
            }
        };

        let mut session = Self {
            browser: Some(browser),
            page,
            alive,
            handler_task: Some(handler_task),
            auth_pump_task: None,
            timeout: Duration::from_secs(config.timeout_secs),
        };

        session.apply_identity_overrides().await?;

        if let Some(ref proxy) = config.proxy {
            session.start_proxy_auth_pump(proxy.clone()).await?;
        }

        info!("Browser session ready");
        Ok(session)
    }

    /// CDP-level identity overrides: UA string, Accept-Language, platform and
    /// timezone. Engine-level overrides are invisible to page scripts, unlike
    /// JavaScript prototype patches.
    async fn apply_identity_overrides(&self) -> Result<(), BrowserError> {
        let ua_params = SetUserAgentOverrideParams::builder()
            .user_agent(USER_AGENT)
            .accept_language(ACCEPT_LANGUAGE)
            .platform("Win32")
            .build()
            .map_err(BrowserError::CdpFailed)?;
        self.page
            .execute(ua_params)
            .await
            .map_err(|e| BrowserError::CdpFailed(e.to_string()))?;

        self.page
            .execute(SetTimezoneOverrideParams::new(TIMEZONE))
            .await
            .map_err(|e| BrowserError::CdpFailed(e.to_string()))?;

        Ok(())
    }

    /// Chrome does not accept inline proxy credentials, so authenticated
    /// proxies are handled by intercepting `Fetch.authRequired` and replying
    /// with the configured username/password. Paused requests are continued
    /// untouched.
    async fn start_proxy_auth_pump(&mut self, proxy: ProxyConfig) -> Result<(), BrowserError> {
        let enable = FetchEnableParams {
            patterns: None,
            handle_auth_requests: Some(true),
        };
        self.page
            .execute(enable)
            .await
            .map_err(|e| BrowserError::CdpFailed(e.to_string()))?;

        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| BrowserError::CdpFailed(e.to_string()))?;
        let mut auth_required = self
            .page
            .event_listener::<EventAuthRequired>()
            .await
            .map_err(|e| BrowserError::CdpFailed(e.to_string()))?;

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = paused.next() => {
                        let params = ContinueRequestParams::new(event.request_id.clone());
                        if let Err(e) = page.execute(params).await {
                            debug!("Failed to continue paused request: {}", e);
                        }
                    }
                    Some(event) = auth_required.next() => {
                        debug!("Answering proxy auth challenge");
                        let challenge = match AuthChallengeResponse::builder()
                            .response(AuthChallengeResponseResponse::ProvideCredentials)
                            .username(proxy.username.clone())
                            .password(proxy.password.clone())
                            .build()
                        {
                            Ok(c) => c,
                            Err(e) => {
                                warn!("Failed to build auth challenge response: {}", e);
                                continue;
                            }
                        };
                        let params =
                            ContinueWithAuthParams::new(event.request_id.clone(), challenge);
                        if let Err(e) = page.execute(params).await {
                            warn!("Failed to answer proxy auth challenge: {}", e);
                        }
                    }
                    else => break,
                }
            }
        });
        self.auth_pump_task = Some(task);
        Ok(())
    }

    /// The single shared page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Navigate and wait for the document to load, bounded by the session
    /// timeout.
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;
        tokio::time::timeout(self.timeout, self.page.wait_for_navigation())
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigation to {url}")))?
            .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;
        Ok(())
    }

    /// Current URL, as the browser reports it after redirects.
    pub async fn current_url(&self) -> Result<String, BrowserError> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::ConnectionLost(e.to_string()))?
            .ok_or_else(|| BrowserError::ConnectionLost("no URL".into()))
    }

    /// Document title.
    pub async fn title(&self) -> Result<String, BrowserError> {
        let value: Option<String> = self
            .page
            .evaluate("document.title")
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?
            .into_value()
            .ok();
        Ok(value.unwrap_or_default())
    }

    /// Full page HTML.
    pub async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))
    }

    /// Evaluate a script and deserialize its result.
    pub async fn evaluate<T: serde::de::DeserializeOwned>(
        &self,
        script: &str,
    ) -> Result<T, BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))
    }

    /// Poll for a selector until it exists or the timeout elapses.
    pub async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "waiting for element {selector}"
                )));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Click an element by selector.
    pub async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{selector}: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        Ok(())
    }

    /// Focus a field and type into it with per-keystroke pacing, using raw
    /// CDP key events rather than value assignment so each keystroke raises
    /// real input events.
    pub async fn type_into(
        &self,
        selector: &str,
        text: &str,
        pacing: &Pacing,
    ) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{selector}: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        for c in text.chars() {
            let key_down = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::KeyDown)
                .text(c.to_string())
                .build()
                .map_err(BrowserError::CdpFailed)?;
            self.page
                .execute(key_down)
                .await
                .map_err(|e| BrowserError::CdpFailed(format!("keyDown: {e}")))?;

            let key_up = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::KeyUp)
                .build()
                .map_err(BrowserError::CdpFailed)?;
            self.page
                .execute(key_up)
                .await
                .map_err(|e| BrowserError::CdpFailed(format!("keyUp: {e}")))?;

            tokio::time::sleep(pacing.keystroke_delay()).await;
        }
        Ok(())
    }

    /// Press the End key, scrolling the document to the bottom.
    pub async fn press_end(&self) -> Result<(), BrowserError> {
        let key_down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::RawKeyDown)
            .key("End")
            .code("End")
            .windows_virtual_key_code(35)
            .native_virtual_key_code(35)
            .build()
            .map_err(BrowserError::CdpFailed)?;
        self.page
            .execute(key_down)
            .await
            .map_err(|e| BrowserError::CdpFailed(format!("End keyDown: {e}")))?;

        let key_up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key("End")
            .code("End")
            .windows_virtual_key_code(35)
            .native_virtual_key_code(35)
            .build()
            .map_err(BrowserError::CdpFailed)?;
        self.page
            .execute(key_up)
            .await
            .map_err(|e| BrowserError::CdpFailed(format!("End keyUp: {e}")))?;
        Ok(())
    }

    /// Dispatch a mouse wheel event at the viewport center.
    pub async fn wheel(&self, delta_y: f64) -> Result<(), BrowserError> {
        let scroll = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(400.0)
            .y(300.0)
            .button(MouseButton::None)
            .delta_x(0.0)
            .delta_y(delta_y)
            .build()
            .map_err(BrowserError::CdpFailed)?;
        self.page
            .execute(scroll)
            .await
            .map_err(|e| BrowserError::CdpFailed(format!("wheel: {e}")))?;
        Ok(())
    }

    /// Move the mouse to a point. Used before typing so the page sees some
    /// pointer activity.
    pub async fn move_mouse(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        let move_event = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .button(MouseButton::None)
            .build()
            .map_err(BrowserError::CdpFailed)?;
        self.page
            .execute(move_event)
            .await
            .map_err(|e| BrowserError::CdpFailed(format!("mouseMove: {e}")))?;
        Ok(())
    }

    /// Current document scroll height.
    pub async fn scroll_height(&self) -> Result<u64, BrowserError> {
        self.evaluate::<u64>("document.body.scrollHeight").await
    }

    /// Inject a cookie bundle into the browsing context.
    pub async fn set_cookies(&self, cookies: Vec<CookieParam>) -> Result<(), BrowserError> {
        self.page
            .set_cookies(cookies)
            .await
            .map_err(|e| BrowserError::CdpFailed(format!("setCookies: {e}")))?;
        Ok(())
    }

    /// Current cookie bundle of the browsing context.
    pub async fn get_cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        self.page
            .get_cookies()
            .await
            .map_err(|e| BrowserError::CdpFailed(format!("getCookies: {e}")))
    }

    /// Drop every cookie in the context. Run before a fresh login so a
    /// rejected session never mixes with new credentials.
    pub async fn clear_cookies(&self) -> Result<(), BrowserError> {
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| BrowserError::CdpFailed(format!("clearCookies: {e}")))?;
        Ok(())
    }

    /// Tear down the browser. Safe to call once on every exit path; the
    /// session provider is the sole owner of the Chrome process.
    pub async fn close(&mut self) {
        self.alive.store(false, Ordering::Relaxed);

        if let Some(task) = self.auth_pump_task.take() {
            task.abort();
        }

        let _ = self.page.clone().close().await;

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Graceful browser close failed: {}", e);
            }
            let _ = browser.wait().await;
        }

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }

        info!("Browser session closed");
    }
}
