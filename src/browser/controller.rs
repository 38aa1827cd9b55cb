//! Browser lifecycle management
//!
//! This module handles browser launch, relaunch, and shutdown, and hands
//! navigation sessions to the session controller. The underlying Chromium
//! process is a single shared resource: launching while an instance is
//! already running tears the previous one down first.

use crate::browser::session::{self, SessionOptions, SessionOutcome};
use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Launch budget used when the configured timeout is zero (disabled)
const LAUNCH_TIMEOUT_DISABLED: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Extra command-line switches passed to the browser process
    pub args: Vec<String>,
    /// Run in headless mode (default: true; forced off by `devtools`)
    pub headless: bool,
    /// Ignore TLS certificate errors during navigation (default: true)
    pub ignore_https_errors: bool,
    /// Auto-open the DevTools panel for each tab (default: false)
    pub devtools: bool,
    /// Path to a Chrome/Chromium executable (None = auto-detect)
    pub executable: Option<String>,
    /// Maximum time to wait for the browser process to start, in
    /// milliseconds (default: 30000; 0 disables the timeout)
    pub launch_timeout_ms: u64,
    /// Dump browser process logging to stderr (default: false)
    pub dumpio: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
            ],
            headless: true,
            ignore_https_errors: true,
            devtools: false,
            executable: None,
            launch_timeout_ms: 30000,
            dumpio: false,
        }
    }
}

impl BrowserConfig {
    /// Create a new config builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    /// Replace the default command-line switches
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add a command-line switch
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.args.push(arg.into());
        self
    }

    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Ignore TLS certificate errors
    pub fn ignore_https_errors(mut self, ignore: bool) -> Self {
        self.config.ignore_https_errors = ignore;
        self
    }

    /// Auto-open DevTools for each tab (implies a headed browser)
    pub fn devtools(mut self, devtools: bool) -> Self {
        self.config.devtools = devtools;
        self
    }

    /// Set the browser executable path
    pub fn executable<S: Into<String>>(mut self, path: S) -> Self {
        self.config.executable = Some(path.into());
        self
    }

    /// Set the launch timeout; 0 disables it
    pub fn launch_timeout_ms(mut self, ms: u64) -> Self {
        self.config.launch_timeout_ms = ms;
        self
    }

    /// Dump browser process logging to stderr
    pub fn dumpio(mut self, dumpio: bool) -> Self {
        self.config.dumpio = dumpio;
        self
    }

    /// Build the config. DevTools cannot open in a headless browser, so
    /// `devtools` forces headed mode.
    pub fn build(mut self) -> BrowserConfig {
        if self.config.devtools {
            self.config.headless = false;
        }
        self.config
    }
}

// A launched browser plus its CDP event-drain task.
struct BrowserRuntime {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserRuntime {
    async fn shutdown(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::CloseFailed(e.to_string()))?;
        // Give the handler task a moment to drain before letting go.
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handler).await;
        Ok(())
    }
}

/// High-level browser controller: one Chromium process, many sessions.
pub struct BrowserController {
    config: BrowserConfig,
    runtime: Option<BrowserRuntime>,
}

impl Default for BrowserController {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserController {
    /// Create a controller with no browser running
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
            runtime: None,
        }
    }

    /// Launch the browser with the given config. If an instance is already
    /// running it is torn down completely first.
    pub async fn launch(&mut self, config: BrowserConfig) -> Result<()> {
        if let Some(runtime) = self.runtime.take() {
            info!("Shutting down previous browser instance before relaunch");
            if let Err(e) = runtime.shutdown().await {
                warn!("Previous browser instance did not close cleanly: {}", e);
            }
        }

        info!("Launching browser: headless={}", config.headless);

        let mut builder = CdpBrowserConfig::builder();

        for arg in &config.args {
            builder = builder.arg(arg);
        }

        if !config.headless {
            builder = builder.with_head();
        }

        if config.devtools {
            builder = builder.arg("--auto-open-devtools-for-tabs");
        }

        if config.dumpio {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        if let Some(ref path) = config.executable {
            builder = builder.chrome_executable(path);
        }

        builder = builder.launch_timeout(if config.launch_timeout_ms == 0 {
            LAUNCH_TIMEOUT_DISABLED
        } else {
            Duration::from_millis(config.launch_timeout_ms)
        });

        let cdp_config = builder
            .build()
            .map_err(|e| BrowserError::ConfigError(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        info!("Browser launched successfully");

        self.config = config;
        self.runtime = Some(BrowserRuntime {
            browser,
            handler: handler_task,
        });
        Ok(())
    }

    /// Open one navigation session: navigate to `url`, capture request and
    /// response traffic, and resolve a single outcome per the session
    /// options. Requires a launched browser.
    pub async fn open(&self, url: &str, options: SessionOptions) -> Result<SessionOutcome> {
        let runtime = self.runtime.as_ref().ok_or(BrowserError::NotLaunched)?;
        session::run(
            &runtime.browser,
            self.config.ignore_https_errors,
            url,
            options,
        )
        .await
    }

    /// Whether a browser instance is currently running
    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// The config of the most recent launch
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Close the browser and release the process. A no-op when nothing is
    /// running.
    pub async fn close(&mut self) -> Result<()> {
        match self.runtime.take() {
            Some(runtime) => {
                info!("Closing browser");
                runtime.shutdown().await?;
                info!("Browser closed");
                Ok(())
            }
            None => {
                debug!("Browser not running");
                Ok(())
            }
        }
    }
}
