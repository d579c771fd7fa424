//! Authentication flow.
//!
//! A small state machine: restore a persisted session and validate it, or
//! fall back to a fresh credential login, pausing for manual resolution when
//! the site raises an interactive challenge. One authenticated page backs
//! the entire run.

mod store;

pub use store::SessionStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::browser::{BrowserError, PageDriver};
use crate::config::Credentials;
use crate::humanize::Pacing;

const FEED_URL: &str = "https://www.linkedin.com/feed/";
const LOGIN_URL: &str = "https://www.linkedin.com/login";
const USERNAME_SELECTOR: &str = "#username";
const PASSWORD_SELECTOR: &str = "#password";
const SUBMIT_SELECTOR: &str = "button[type='submit']";
const PASSWORD_ERROR_SELECTOR: &str = "#error-for-password";
/// Element that only renders on the authenticated feed.
const FEED_READY_SELECTOR: &str = ".feed-shared-update-v2";

/// Settle time after submitting the login form before classifying where we
/// landed.
const POST_SUBMIT_SETTLE: Duration = Duration::from_secs(5);
/// Bound on post-challenge re-validation.
const FEED_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Authentication errors. All of these are fatal to the run: without an
/// authenticated page no extraction can proceed.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no credentials available for fresh login")]
    MissingCredentials,

    #[error("login rejected: {0}")]
    CredentialsRejected(String),

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("challenge could not be resolved: {0}")]
    ChallengeUnresolved(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Where the browser landed after submitting the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostLoginState {
    /// The feed loaded; login succeeded.
    FeedReached,
    /// An interactive checkpoint/2FA challenge interrupted the flow.
    ChallengeDetected,
    /// Still on the login surface with an explicit error message.
    ErrorDetected(String),
    /// Still on the login surface, no error element rendered.
    StuckOnLogin,
    /// Somewhere unexpected. Treated as tentative success.
    Unknown,
}

/// Classify the post-submit destination from its URL and any visible
/// password error text.
pub fn classify_post_login(url: &str, error_text: Option<&str>) -> PostLoginState {
    if url.contains("feed") {
        return PostLoginState::FeedReached;
    }
    if url.contains("checkpoint") || url.contains("challenge") {
        return PostLoginState::ChallengeDetected;
    }
    if url.contains("login") {
        return match error_text {
            Some(text) if !text.trim().is_empty() => {
                PostLoginState::ErrorDetected(text.trim().to_string())
            }
            _ => PostLoginState::StuckOnLogin,
        };
    }
    PostLoginState::Unknown
}

/// Capability for resolving interactive challenges (CAPTCHA/2FA). The real
/// deployment blocks on an operator; tests plug in an automatic resolver.
#[async_trait]
pub trait ChallengeResolver: Send + Sync {
    async fn resolve(&self) -> Result<(), AuthError>;
}

/// Blocks until the operator confirms on the console that the challenge in
/// the browser window has been solved.
pub struct OperatorChallengeResolver;

#[async_trait]
impl ChallengeResolver for OperatorChallengeResolver {
    async fn resolve(&self) -> Result<(), AuthError> {
        warn!("==================================");
        warn!("MANUAL INTERVENTION REQUIRED");
        warn!("Solve the CAPTCHA or 2FA in the browser window,");
        warn!("then press ENTER here once you can see the feed.");
        warn!("==================================");

        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| ())
        })
        .await
        .map_err(|e| AuthError::ChallengeUnresolved(format!("operator wait aborted: {e}")))?
        .map_err(|e| AuthError::ChallengeUnresolved(format!("console unavailable: {e}")))?;

        Ok(())
    }
}

/// Resolves every challenge immediately. Test harness use only.
pub struct AutoChallengeResolver;

#[async_trait]
impl ChallengeResolver for AutoChallengeResolver {
    async fn resolve(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Drives the login state machine against the shared browser session.
pub struct AuthManager {
    store: SessionStore,
    credentials: Option<Credentials>,
    pacing: Pacing,
    resolver: Box<dyn ChallengeResolver>,
}

impl AuthManager {
    pub fn new(
        store: SessionStore,
        credentials: Option<Credentials>,
        pacing: Pacing,
        resolver: Box<dyn ChallengeResolver>,
    ) -> Self {
        Self {
            store,
            credentials,
            pacing,
            resolver,
        }
    }

    /// Establish an authenticated page: restore-and-validate a persisted
    /// session, or perform a fresh login.
    pub async fn login(&self, session: &dyn PageDriver) -> Result<(), AuthError> {
        if let Some(cookies) = self.store.load() {
            info!("Session loaded from {:?}. Validating...", self.store.path());
            session.set_cookies(cookies).await?;
            if self.validate_session(session).await? {
                info!("Persisted session is valid, skipping fresh login");
                return Ok(());
            }
            info!("Session invalid. Proceeding with fresh login.");
            // A rejected bundle must never mix with a new login.
            session.clear_cookies().await?;
        } else {
            info!("No session file found. Proceeding with fresh login.");
        }

        self.fresh_login(session).await
    }

    /// Navigate to the authenticated-only feed and inspect where we end up.
    async fn validate_session(&self, session: &dyn PageDriver) -> Result<bool, AuthError> {
        session.navigate(FEED_URL).await?;
        self.pacing.settle().await;
        let url = session.current_url().await?;
        Ok(url.contains("feed") || url.contains("mynetwork"))
    }

    async fn fresh_login(&self, session: &dyn PageDriver) -> Result<(), AuthError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(AuthError::MissingCredentials)?;

        info!("Navigating to login page...");
        session.navigate(LOGIN_URL).await?;
        self.pacing.pause().await;
        session
            .wait_for_element(USERNAME_SELECTOR, Duration::from_secs(10))
            .await?;

        session.move_mouse(100.0, 100.0).await?;
        self.pacing.pause().await;

        session
            .type_into(USERNAME_SELECTOR, &creds.username, &self.pacing)
            .await?;
        self.pacing.pause().await;

        session
            .type_into(PASSWORD_SELECTOR, &creds.password, &self.pacing)
            .await?;
        self.pacing.pause().await;

        session.click(SUBMIT_SELECTOR).await?;

        self.handle_post_login(session).await?;

        // Persist the bundle after any successful fresh login. A write
        // failure costs session reuse next run, not this run.
        match session.get_cookies().await {
            Ok(cookies) => {
                if let Err(e) = self.store.save(&cookies) {
                    warn!("Failed to persist session cookies: {}", e);
                }
            }
            Err(e) => warn!("Failed to read cookies for persistence: {}", e),
        }

        Ok(())
    }

    async fn handle_post_login(&self, session: &dyn PageDriver) -> Result<(), AuthError> {
        info!("Waiting for post-login redirection...");
        tokio::time::sleep(POST_SUBMIT_SETTLE).await;

        let url = session.current_url().await?;
        let error_text: Option<String> = session
            .eval_text(
                &format!(
                    "(() => {{ const el = document.querySelector({PASSWORD_ERROR_SELECTOR:?}); \
                     return el ? el.innerText : null; }})()"
                ),
            )
            .await
            .unwrap_or(None);

        match classify_post_login(&url, error_text.as_deref()) {
            PostLoginState::FeedReached => {
                info!("Login successful. Feed page reached.");
                Ok(())
            }
            PostLoginState::ChallengeDetected => {
                warn!("Checkpoint or 2FA challenge detected!");
                self.resolver.resolve().await?;
                self.verify_after_challenge(session).await
            }
            PostLoginState::ErrorDetected(text) => Err(AuthError::CredentialsRejected(text)),
            PostLoginState::StuckOnLogin => Err(AuthError::LoginFailed(
                "still on login page, no explicit error and not on feed".into(),
            )),
            PostLoginState::Unknown => {
                warn!(
                    "Landed on unknown page ({}), assuming success for now but monitoring.",
                    url
                );
                Ok(())
            }
        }
    }

    /// After the operator signals resolution, confirm we can actually reach
    /// the feed, bounded by a timeout.
    async fn verify_after_challenge(&self, session: &dyn PageDriver) -> Result<(), AuthError> {
        let url = session.current_url().await?;
        if !url.contains("feed") {
            session.navigate(FEED_URL).await?;
            session
                .wait_for_element(FEED_READY_SELECTOR, FEED_READY_TIMEOUT)
                .await
                .map_err(|e| {
                    AuthError::ChallengeUnresolved(format!("feed not reachable after resolve: {e}"))
                })?;
        }
        info!("Challenge solved successfully.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
    use std::sync::Mutex;

    use crate::config::Credentials;

    /// Scripted page driver that records every call. Reports the login URL
    /// until the submit button has been clicked, then the feed URL.
    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingDriver {
        fn log(&self, entry: impl Into<String>) {
            self.calls.lock().unwrap().push(entry.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn submitted(&self) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.starts_with("click:"))
        }
    }

    #[async_trait]
    impl PageDriver for RecordingDriver {
        async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
            self.log(format!("navigate:{url}"));
            Ok(())
        }

        async fn current_url(&self) -> Result<String, BrowserError> {
            if self.submitted() {
                Ok(FEED_URL.to_string())
            } else {
                Ok(LOGIN_URL.to_string())
            }
        }

        async fn title(&self) -> Result<String, BrowserError> {
            Ok(String::new())
        }

        async fn content(&self) -> Result<String, BrowserError> {
            Ok("<html></html>".to_string())
        }

        async fn eval_text(&self, _script: &str) -> Result<Option<String>, BrowserError> {
            Ok(None)
        }

        async fn wait_for_element(
            &self,
            selector: &str,
            _timeout: Duration,
        ) -> Result<(), BrowserError> {
            self.log(format!("wait:{selector}"));
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<(), BrowserError> {
            self.log(format!("click:{selector}"));
            Ok(())
        }

        async fn type_into(
            &self,
            selector: &str,
            _text: &str,
            _pacing: &Pacing,
        ) -> Result<(), BrowserError> {
            self.log(format!("type:{selector}"));
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
            Ok(0)
        }

        async fn set_cookies(&self, _cookies: Vec<CookieParam>) -> Result<(), BrowserError> {
            self.log("set_cookies");
            Ok(())
        }

        async fn get_cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
            Ok(vec![])
        }

        async fn clear_cookies(&self) -> Result<(), BrowserError> {
            self.log("clear_cookies");
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
    async fn invalid_restored_session_clears_cookies_before_fresh_login() {
        let mut path = std::env::temp_dir();
        path.push(format!("linkscrape-auth-stale-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"name": "li_at", "value": "stale", "domain": ".linkedin.com", "path": "/"}]"#,
        )
        .unwrap();

        let driver = RecordingDriver::default();
        let manager = AuthManager::new(
            SessionStore::new(&path),
            Some(Credentials {
                username: "user@example.com".into(),
                password: "pw".into(),
            }),
            test_pacing(),
            Box::new(AutoChallengeResolver),
        );

        manager.login(&driver).await.unwrap();
        std::fs::remove_file(&path).ok();

        let calls = driver.calls();
        let restored = calls
            .iter()
            .position(|c| c == "set_cookies")
            .expect("persisted bundle injected");
        let cleared = calls
            .iter()
            .position(|c| c == "clear_cookies")
            .expect("stale bundle cleared");
        let fresh = calls
            .iter()
            .position(|c| c == &format!("navigate:{LOGIN_URL}"))
            .expect("fresh login started");
        assert!(restored < cleared);
        assert!(cleared < fresh);
    }

    #[test]
    fn feed_url_classifies_as_success() {
        assert_eq!(
            classify_post_login("https://www.linkedin.com/feed/", None),
            PostLoginState::FeedReached
        );
    }

    #[test]
    fn checkpoint_and_challenge_urls_classify_as_challenge() {
        assert_eq!(
            classify_post_login("https://www.linkedin.com/checkpoint/lg/abc", None),
            PostLoginState::ChallengeDetected
        );
        assert_eq!(
            classify_post_login("https://www.linkedin.com/challenge/verify", None),
            PostLoginState::ChallengeDetected
        );
    }

    #[test]
    fn login_page_with_error_surfaces_the_error_text() {
        let state = classify_post_login(
            "https://www.linkedin.com/login",
            Some("Wrong email or password."),
        );
        assert_eq!(
            state,
            PostLoginState::ErrorDetected("Wrong email or password.".into())
        );
    }

    #[test]
    fn login_page_without_error_is_distinct_from_rejection() {
        assert_eq!(
            classify_post_login("https://www.linkedin.com/login", None),
            PostLoginState::StuckOnLogin
        );
        assert_eq!(
            classify_post_login("https://www.linkedin.com/login", Some("   ")),
            PostLoginState::StuckOnLogin
        );
    }

    #[test]
    fn anything_else_is_tentative_success() {
        assert_eq!(
            classify_post_login("https://www.linkedin.com/notifications/", None),
            PostLoginState::Unknown
        );
    }

    #[tokio::test]
    async fn auto_resolver_returns_immediately() {
        assert!(AutoChallengeResolver.resolve().await.is_ok());
    }
}
