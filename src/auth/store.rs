//! Persisted session storage.
//!
//! The cookie bundle is opaque to us: cookies come out of the browser, get
//! serialized verbatim, and go back in on the next run. Nothing here
//! interprets cookie semantics.

use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use tracing::{error, info};

/// File-backed store for the authentication cookie bundle.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted cookie bundle, if any. Read or parse failures are
    /// logged and treated the same as an absent session.
    pub fn load(&self) -> Option<Vec<CookieParam>> {
        if !self.path.exists() {
            return None;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<CookieParam>>(&content) {
                Ok(cookies) => Some(cookies),
                Err(e) => {
                    error!("Error parsing session file {:?}: {}", self.path, e);
                    None
                }
            },
            Err(e) => {
                error!("Error loading session file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Persist the current cookie bundle, fully overwriting prior contents.
    pub fn save(&self, cookies: &[Cookie]) -> std::io::Result<()> {
        let content = serde_json::to_string(cookies)?;
        std::fs::write(&self.path, content)?;
        info!("Session saved to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> SessionStore {
        let mut path = std::env::temp_dir();
        path.push(format!("linkscrape-{}-{}.json", name, std::process::id()));
        SessionStore::new(path)
    }

    #[test]
    fn missing_file_yields_no_session() {
        let store = temp_store("missing");
        std::fs::remove_file(store.path()).ok();
        assert!(store.load().is_none());
    }

    #[test]
    fn cookie_bundle_loads_from_serialized_form() {
        let store = temp_store("roundtrip");
        let raw = r#"[
            {"name": "li_at", "value": "tok", "domain": ".linkedin.com",
             "path": "/", "secure": true, "httpOnly": true}
        ]"#;
        std::fs::write(store.path(), raw).unwrap();

        let cookies = store.load().expect("bundle should load");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "li_at");
        assert_eq!(cookies[0].value, "tok");

        std::fs::remove_file(store.path()).ok();
    }

    #[test]
    fn corrupt_file_is_treated_as_absent() {
        let store = temp_store("corrupt");
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.load().is_none());
        std::fs::remove_file(store.path()).ok();
    }
}
