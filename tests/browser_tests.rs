//! Browser module tests
//!
//! These tests verify the browser configuration and session option types.
//! Note: full browser integration tests require a running Chrome/Chromium
//! instance; see `session_tests.rs`.

use webtap::{BrowserConfig, BrowserController, SessionOptions, WaitFor, WaitUntil};

#[test]
fn test_browser_config_default() {
    let config = BrowserConfig::default();
    assert!(config.headless);
    assert!(config.ignore_https_errors);
    assert!(!config.devtools);
    assert!(!config.dumpio);
    assert!(config.executable.is_none());
    assert_eq!(config.launch_timeout_ms, 30000);
    assert_eq!(config.args, vec!["--no-sandbox", "--disable-setuid-sandbox"]);
}

#[test]
fn test_browser_config_builder() {
    let config = BrowserConfig::builder()
        .headless(false)
        .ignore_https_errors(false)
        .executable("/usr/bin/chromium-browser")
        .launch_timeout_ms(0)
        .arg("--disable-gpu")
        .build();

    assert!(!config.headless);
    assert!(!config.ignore_https_errors);
    assert_eq!(config.executable.as_deref(), Some("/usr/bin/chromium-browser"));
    assert_eq!(config.launch_timeout_ms, 0);
    assert_eq!(config.args.len(), 3);
}

#[test]
fn test_devtools_config_implies_headed() {
    let config = BrowserConfig::builder().devtools(true).build();
    assert!(config.devtools);
    assert!(!config.headless);
}

#[test]
fn test_session_options_default() {
    let options = SessionOptions::default();
    assert!(options.rules.is_empty());
    assert!(options.wait_for.is_none());
    assert_eq!(options.timeout_ms, 30000);
    assert!(options.force_network);
}

#[test]
fn test_wait_for_parsing() {
    assert_eq!(
        "load".parse::<WaitFor>().unwrap(),
        WaitFor::Event(WaitUntil::Load)
    );
    assert_eq!(
        "networkidle0".parse::<WaitFor>().unwrap(),
        WaitFor::Event(WaitUntil::NetworkIdle0)
    );
    assert_eq!(
        "#main .item".parse::<WaitFor>().unwrap(),
        WaitFor::Selector("#main .item".to_string())
    );
}

#[tokio::test]
async fn test_open_without_launch_is_rejected() {
    let tap = BrowserController::new();
    let result = tap.open("https://example.com", SessionOptions::default()).await;
    let err = result.err().expect("open must fail before launch");
    assert!(err.to_string().contains("not launched"));
}

#[tokio::test]
async fn test_close_without_launch_is_a_noop() {
    let mut tap = BrowserController::new();
    assert!(tap.close().await.is_ok());
    assert!(!tap.is_running());
}
