//! # Webtap - Quick Capture Example
//!
//! Launches a browser, opens a page with one abort rule installed, and
//! prints the captured network ledger.
//!
//! Run with: `cargo run --example quick-capture`

use webtap::{BrowserConfig, BrowserController, InterceptRule, SessionOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut tap = BrowserController::new();
    tap.launch(BrowserConfig::default()).await?;

    let options = SessionOptions {
        rules: vec![InterceptRule::abort("/static/pingbi.js")],
        ..Default::default()
    };

    let outcome = tap.open("https://example.com", options).await?;

    println!("completed: {}", outcome.completed);
    for record in &outcome.records {
        let status = record
            .response
            .as_ref()
            .map(|r| r.status.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>4}  {:?}  {} {}", status, record.outcome, record.method, record.url);
    }

    if let Some(page) = outcome.page {
        page.close().await.ok();
    }
    tap.close().await?;
    Ok(())
}
