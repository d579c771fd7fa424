//! Browser automation module
//!
//! Owns the Chrome process and the single authenticated page the scraping
//! sequence runs against.

mod driver;
mod errors;
mod session;

pub use driver::PageDriver;
pub use errors::BrowserError;
pub use session::{BrowserSession, BrowserSessionConfig};
