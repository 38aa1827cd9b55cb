//! Browser automation module
//!
//! This module provides browser lifecycle control through ChromiumOxide and
//! the navigation session machinery: request/response capture, interception
//! policy, and wait conditions.

pub mod controller;
pub mod intercept;
pub mod ledger;
pub mod navigation;
pub mod session;

pub use controller::{BrowserConfig, BrowserConfigBuilder, BrowserController};
pub use intercept::{evaluate, Decision, InterceptRule, RequestOverrides, ResponseFixture, RuleAction};
pub use ledger::{
    NetworkLedger, RemoteAddress, RequestOutcome, RequestRecord, ResponseRecord, SecurityDetails,
};
pub use navigation::{WaitFor, WaitUntil};
pub use session::{SessionOptions, SessionOutcome};
