//! Webtap - Browser Network Capture & Request Interception
//!
//! This crate automates a headless Chromium instance (over CDP) to navigate
//! to a page and capture every network request/response pair generated
//! during the visit, optionally intercepting, aborting, answering, or
//! redirecting matched requests.
//!
//! # Architecture
//!
//! ```text
//! Caller ──▶ BrowserController ──▶ Session Controller (CDP)
//!                                       │
//!                       ┌───────────────┼────────────────┐
//!                       ▼               ▼                ▼
//!                 Interception    Request/Response   Wait-condition
//!                 Policy          Ledger             Race
//! ```
//!
//! One `open` call is one session: the controller opens a page, observes
//! request and response events into an ordered ledger, applies the caller's
//! interception rules exactly once per request, and resolves exactly one
//! outcome: completed with the full ledger, or (by default) a degraded
//! outcome carrying the partial ledger and the interrupting error.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use webtap::{BrowserConfig, BrowserController, InterceptRule, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tap = BrowserController::new();
//!     tap.launch(BrowserConfig::default()).await?;
//!
//!     let options = SessionOptions {
//!         rules: vec![InterceptRule::abort("/static/pingbi.js")],
//!         ..Default::default()
//!     };
//!     let outcome = tap.open("https://example.com", options).await?;
//!
//!     println!("captured {} requests", outcome.records.len());
//!     if let Some(page) = outcome.page {
//!         page.close().await.ok();
//!     }
//!     tap.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod error;

// Re-exports for convenience
pub use browser::{
    evaluate, BrowserConfig, BrowserController, Decision, InterceptRule, NetworkLedger,
    RequestOutcome, RequestOverrides, RequestRecord, ResponseFixture, ResponseRecord,
    SessionOptions, SessionOutcome, WaitFor, WaitUntil,
};
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
