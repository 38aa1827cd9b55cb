//! Wait conditions for navigation sessions
//!
//! A session settles its navigation at the earliest of the four lifecycle
//! signals, then optionally waits for an explicit condition: a named
//! lifecycle event or a CSS selector. All waits are cooperative and bounded
//! by the session timeout; a timeout of zero disables the bound.

use crate::error::{Result, SessionError};
use chromiumoxide::Page;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::trace;

/// Page readiness poll interval
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period approximating the engine's network-idle quiet window
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);

/// Named navigation lifecycle signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The load event fired
    Load,
    /// The DOMContentLoaded event fired
    DomContentLoaded,
    /// No network connections for at least 500ms
    NetworkIdle0,
    /// At most 2 network connections for at least 500ms
    NetworkIdle2,
}

impl WaitUntil {
    /// Canonical event name
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::NetworkIdle0 => "networkidle0",
            WaitUntil::NetworkIdle2 => "networkidle2",
        }
    }

    /// Parse a canonical event name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "load" => Some(WaitUntil::Load),
            "domcontentloaded" => Some(WaitUntil::DomContentLoaded),
            "networkidle0" => Some(WaitUntil::NetworkIdle0),
            "networkidle2" => Some(WaitUntil::NetworkIdle2),
            _ => None,
        }
    }

    // Document readiness expression observed from the page. The network-idle
    // variants key off the load event and add a quiet-window grace sleep.
    fn ready_expr(&self) -> &'static str {
        match self {
            WaitUntil::DomContentLoaded => "document.readyState !== 'loading'",
            _ => "document.readyState === 'complete'",
        }
    }
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a session waits for after navigation settles: a lifecycle event or
/// a CSS selector appearing in the page. Anything that is not one of the
/// four event names is treated as a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFor {
    /// Wait for a navigation lifecycle event
    Event(WaitUntil),
    /// Wait for a CSS selector to appear
    Selector(String),
}

impl FromStr for WaitFor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match WaitUntil::parse(s) {
            Some(event) => WaitFor::Event(event),
            None => WaitFor::Selector(s.to_string()),
        })
    }
}

impl fmt::Display for WaitFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitFor::Event(event) => write!(f, "{}", event),
            WaitFor::Selector(selector) => f.write_str(selector),
        }
    }
}

/// Run a wait bounded by `timeout_ms`; zero disables the bound.
pub(crate) async fn bounded<T>(
    timeout_ms: u64,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    if timeout_ms == 0 {
        return fut.await;
    }
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::WaitTimeout(timeout_ms).into()),
    }
}

// Poll a boolean page expression until it holds. Evaluation failures are
// treated as "not yet": execution contexts come and go while the page
// navigates, and a transient failure must not fail the session.
async fn poll_expr(page: &Page, expr: &str) -> Result<()> {
    loop {
        match page.evaluate(expr).await {
            Ok(result) => {
                if result.into_value::<bool>().unwrap_or(false) {
                    return Ok(());
                }
            }
            Err(e) => trace!("readiness probe failed, retrying: {}", e),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until the navigation has committed: the earliest of the four
/// lifecycle signals, which in document terms is the DOM leaving the
/// `loading` state.
pub(crate) async fn wait_for_settle(page: &Page) -> Result<()> {
    poll_expr(page, WaitUntil::DomContentLoaded.ready_expr()).await
}

/// Wait for a specific lifecycle condition, bounded by `timeout_ms`.
pub(crate) async fn wait_for_event(page: &Page, event: WaitUntil, timeout_ms: u64) -> Result<()> {
    bounded(timeout_ms, async {
        poll_expr(page, event.ready_expr()).await?;
        if matches!(event, WaitUntil::NetworkIdle0 | WaitUntil::NetworkIdle2) {
            tokio::time::sleep(NETWORK_IDLE_GRACE).await;
        }
        Ok(())
    })
    .await
}

/// Wait for `selector` to appear in the page, bounded by `timeout_ms`.
pub(crate) async fn wait_for_selector(page: &Page, selector: &str, timeout_ms: u64) -> Result<()> {
    let expr = format!(
        "document.querySelector(\"{}\") !== null",
        selector.replace('\\', "\\\\").replace('"', "\\\"")
    );
    bounded(timeout_ms, poll_expr(page, &expr)).await
}
