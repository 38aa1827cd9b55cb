//! Webtap CLI
//!
//! Navigate to a URL in a headless browser, capture the network traffic the
//! visit generates, and dump the request/response ledger as JSON.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use webtap::{BrowserConfig, BrowserController, InterceptRule, SessionOptions, WaitFor};

/// Webtap - browser network capture and request interception
#[derive(Parser, Debug)]
#[command(name = "webtap")]
#[command(version)]
#[command(about = "Capture and intercept browser network traffic")]
struct Args {
    /// URL to navigate to
    url: String,

    /// Path to a JSON file of interception rules
    /// (e.g. [{"url": "/ads", "abort": true}])
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Wait condition: load, domcontentloaded, networkidle0, networkidle2,
    /// or a CSS selector. Without it, the session waits out --timeout and
    /// completes.
    #[arg(long)]
    wait_for: Option<WaitFor>,

    /// Wait budget in milliseconds (0 disables the bound in wait-for modes)
    #[arg(long, default_value = "30000")]
    timeout: u64,

    /// Fail on navigation/wait errors instead of keeping partial data
    #[arg(long)]
    no_force_network: bool,

    /// Path to a Chrome/Chromium executable
    #[arg(long)]
    executable: Option<String>,

    /// Run with a visible browser window
    #[arg(long)]
    headed: bool,

    /// Auto-open DevTools for each tab (implies --headed)
    #[arg(long)]
    devtools: bool,

    /// Write the ledger JSON to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rules: Vec<InterceptRule> = match &args.rules {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };
    if !rules.is_empty() {
        info!("Loaded {} interception rules", rules.len());
    }

    let mut builder = BrowserConfig::builder()
        .headless(!args.headed)
        .devtools(args.devtools);
    if let Some(ref path) = args.executable {
        builder = builder.executable(path);
    }

    let mut tap = BrowserController::new();
    tap.launch(builder.build()).await?;

    let options = SessionOptions {
        rules,
        wait_for: args.wait_for.clone(),
        timeout_ms: args.timeout,
        force_network: !args.no_force_network,
    };

    let outcome = match tap.open(&args.url, options).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tap.close().await.ok();
            if e.is_recoverable() {
                anyhow::bail!("{e} (drop --no-force-network to keep partial network data)");
            }
            return Err(e.into());
        }
    };

    if let Some(ref error) = outcome.error {
        warn!("Navigation did not complete: {}", error);
    }

    let report = serde_json::json!({
        "url": args.url,
        "completed": outcome.completed,
        "records": outcome.records,
    });
    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Wrote {} records to {}", outcome.records.len(), path.display());
        }
        None => println!("{json}"),
    }

    if let Some(page) = outcome.page {
        page.close().await.ok();
    }
    tap.close().await?;
    Ok(())
}
