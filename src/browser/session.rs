//! Navigation session controller
//!
//! One session owns one navigation attempt: it opens a page, installs
//! request/response observers, drives navigation, waits out the configured
//! completion condition, and resolves exactly one outcome. Observer tasks
//! only populate the session's ledger; the session future is the only code
//! path that can resolve the outcome, and the observers are stopped before
//! the records are handed to the caller.

use crate::browser::intercept::{self, Decision, InterceptRule, RequestOverrides, ResponseFixture};
use crate::browser::ledger::{
    headers_to_map, NetworkLedger, RemoteAddress, RequestOutcome, RequestRecord, ResponseRecord,
    SecurityDetails,
};
use crate::browser::navigation::{self, WaitFor};
use crate::error::{Error, Result, SessionError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, FulfillRequestParams,
    HeaderEntry, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, ErrorReason, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Budget for the navigation call itself (the wait stage has its own clock)
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for one navigation session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Interception rules, evaluated in order. An empty list observes
    /// traffic without intercepting it.
    pub rules: Vec<InterceptRule>,
    /// Condition to wait for after navigation settles. `None` waits out
    /// `timeout_ms` unconditionally and then completes.
    pub wait_for: Option<WaitFor>,
    /// Wait budget in milliseconds. With a `wait_for` condition this bounds
    /// the wait (0 disables the bound); without one it is the settle delay.
    pub timeout_ms: u64,
    /// Prefer partial network data over failure: on navigation or wait
    /// errors, close the page and resolve a degraded outcome instead of
    /// rejecting (default: true).
    pub force_network: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            wait_for: None,
            timeout_ms: 30000,
            force_network: true,
        }
    }
}

/// Terminal result of one navigation session
pub struct SessionOutcome {
    /// The open page handle; present on completed sessions (the caller is
    /// responsible for closing it), absent on degraded outcomes (the
    /// session already closed the page).
    pub page: Option<Page>,
    /// Every observed request, in arrival order, with matched responses
    pub records: Vec<RequestRecord>,
    /// Whether the session ran to normal completion
    pub completed: bool,
    /// The error that interrupted completion, on degraded outcomes
    pub error: Option<Error>,
}

/// Drive one navigation session against a launched browser.
pub(crate) async fn run(
    browser: &Browser,
    ignore_https_errors: bool,
    url: &str,
    options: SessionOptions,
) -> Result<SessionOutcome> {
    validate_url(url)?;

    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| SessionError::PageCreationFailed(e.to_string()))?;
    debug!("Page created");

    let ledger = Arc::new(Mutex::new(NetworkLedger::default()));
    let mut observers: Vec<JoinHandle<()>> = Vec::new();

    let driven = drive(&page, ignore_https_errors, url, &options, &ledger, &mut observers).await;

    // Observers only populate the ledger; stop them before the records are
    // assembled so nothing mutates them afterwards.
    for task in &observers {
        task.abort();
    }
    let records = std::mem::take(&mut *ledger.lock()).into_records();

    match driven {
        Ok(()) => {
            info!("Session completed: {} requests captured", records.len());
            Ok(SessionOutcome {
                page: Some(page),
                records,
                completed: true,
                error: None,
            })
        }
        Err(e) if options.force_network => {
            warn!("Session degraded, keeping partial network data: {}", e);
            if let Err(close_err) = page.close().await {
                debug!("Page close after session failure: {}", close_err);
            }
            Ok(SessionOutcome {
                page: None,
                records,
                completed: false,
                error: Some(e),
            })
        }
        Err(e) => Err(e),
    }
}

async fn drive(
    page: &Page,
    ignore_https_errors: bool,
    url: &str,
    options: &SessionOptions,
    ledger: &Arc<Mutex<NetworkLedger>>,
    observers: &mut Vec<JoinHandle<()>>,
) -> Result<()> {
    if ignore_https_errors {
        page.execute(SetIgnoreCertificateErrorsParams::new(true))
            .await?;
    }

    if options.rules.is_empty() {
        observers.push(spawn_request_observer(page, ledger).await?);
    } else {
        observers.push(spawn_interceptor(page, ledger, options.rules.clone()).await?);
    }
    observers.push(spawn_response_observer(page, ledger).await?);

    info!("Navigating to {}", url);
    navigate(page, url).await?;
    debug!("Navigation settled for {}", url);

    match &options.wait_for {
        None => {
            // Unconditional settle delay, not a completion signal: it gives
            // in-flight network activity time to land in the ledger.
            tokio::time::sleep(Duration::from_millis(options.timeout_ms)).await;
            Ok(())
        }
        Some(WaitFor::Event(event)) => {
            navigation::wait_for_event(page, *event, options.timeout_ms).await?;
            debug!("Lifecycle condition {} reached", event);
            Ok(())
        }
        Some(WaitFor::Selector(selector)) => {
            navigation::wait_for_selector(page, selector, options.timeout_ms).await?;
            debug!("Selector {} appeared", selector);
            Ok(())
        }
    }
}

// Issue the navigation and wait until it commits: the call settles at the
// earliest of the lifecycle signals.
async fn navigate(page: &Page, url: &str) -> Result<()> {
    tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(url))
        .await
        .map_err(|_| {
            SessionError::NavigationFailed(format!(
                "navigation timed out after {}ms",
                NAVIGATION_TIMEOUT.as_millis()
            ))
        })?
        .map_err(|e| SessionError::NavigationFailed(e.to_string()))?;

    navigation::bounded(
        NAVIGATION_TIMEOUT.as_millis() as u64,
        navigation::wait_for_settle(page),
    )
    .await
    .map_err(|_| SessionError::NavigationFailed("page did not leave the loading state".into()))?;
    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://") {
        Ok(())
    } else {
        Err(SessionError::InvalidUrl(format!(
            "URL must start with http://, https://, or file://: {}",
            url
        ))
        .into())
    }
}

fn request_key(id: &network::RequestId) -> String {
    let raw: &str = id.as_ref();
    raw.to_string()
}

fn record_from_request(
    request: &network::Request,
    resource_type: Option<&ResourceType>,
) -> RequestRecord {
    let mut record = RequestRecord::new(
        request.url.clone(),
        request.method.clone(),
        resource_type
            .map(|t| t.as_ref().to_string())
            .unwrap_or_else(|| "Other".to_string()),
    );
    record.headers = headers_to_map(request.headers.inner());
    record.post_data = request.post_data.clone();
    record
}

// Observe-only mode: every request is appended to the ledger and proceeds
// untouched.
async fn spawn_request_observer(
    page: &Page,
    ledger: &Arc<Mutex<NetworkLedger>>,
) -> Result<JoinHandle<()>> {
    let mut events = page.event_listener::<EventRequestWillBeSent>().await?;
    let ledger = Arc::clone(ledger);
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let record = record_from_request(&event.request, event.r#type.as_ref());
            debug!("Observed request: {} {}", record.method, record.url);
            ledger
                .lock()
                .record_request(request_key(&event.request_id), record);
        }
    }))
}

// Interception mode: requests pause at the fetch layer, are appended to the
// ledger, and the first matching rule decides what happens to them.
async fn spawn_interceptor(
    page: &Page,
    ledger: &Arc<Mutex<NetworkLedger>>,
    rules: Vec<InterceptRule>,
) -> Result<JoinHandle<()>> {
    let mut events = page.event_listener::<EventRequestPaused>().await?;
    page.execute(
        fetch::EnableParams::builder()
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Request)
                    .build(),
            )
            .build(),
    )
    .await?;

    let page = page.clone();
    let ledger = Arc::clone(ledger);
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let Err(e) = on_request_paused(&page, &ledger, &rules, &event).await {
                // Contained at the callback boundary: a failed interception
                // action must not take the session down.
                warn!("Request interception failed for {}: {}", event.request.url, e);
            }
        }
    }))
}

async fn on_request_paused(
    page: &Page,
    ledger: &Arc<Mutex<NetworkLedger>>,
    rules: &[InterceptRule],
    event: &EventRequestPaused,
) -> Result<()> {
    // Key records by the network-layer id when present so the response
    // observer can find them; fall back to the fetch-layer id.
    let key = event
        .network_id
        .as_ref()
        .map(request_key)
        .unwrap_or_else(|| {
            let raw: &str = event.request_id.as_ref();
            raw.to_string()
        });

    let record = record_from_request(&event.request, Some(&event.resource_type));
    let url = record.url.clone();
    debug!("Intercepted request: {} {}", record.method, url);
    ledger.lock().record_request(key.clone(), record);

    match intercept::evaluate(rules, &url) {
        Decision::Abort => {
            page.execute(FailRequestParams::new(
                event.request_id.clone(),
                ErrorReason::Aborted,
            ))
            .await?;
            ledger.lock().set_outcome(&key, RequestOutcome::Aborted);
            info!("Aborted request to {}", url);
        }
        Decision::Respond(fixture) => {
            page.execute(fulfill_params(event.request_id.clone(), fixture))
                .await?;
            ledger.lock().set_outcome(&key, RequestOutcome::Responded);
            info!("Answered request to {} with fixture status {}", url, fixture.status);
        }
        Decision::Forward(overrides) => {
            page.execute(continue_params(event.request_id.clone(), overrides))
                .await?;
            ledger.lock().set_outcome(&key, RequestOutcome::Forwarded);
            info!("Forwarded request to {} with overrides", url);
        }
        Decision::PassThrough => {
            page.execute(ContinueRequestParams::new(event.request_id.clone()))
                .await?;
        }
    }
    Ok(())
}

fn fulfill_params(request_id: fetch::RequestId, fixture: &ResponseFixture) -> FulfillRequestParams {
    let mut params = FulfillRequestParams::new(request_id, i64::from(fixture.status));
    if let Some(ref content_type) = fixture.content_type {
        params.response_headers = Some(vec![HeaderEntry {
            name: "Content-Type".to_string(),
            value: content_type.clone(),
        }]);
    }
    if let Some(ref body) = fixture.body {
        params.body = Some(BASE64.encode(body.as_bytes()).into());
    }
    params
}

fn continue_params(
    request_id: fetch::RequestId,
    overrides: &RequestOverrides,
) -> ContinueRequestParams {
    let mut params = ContinueRequestParams::new(request_id);
    params.url = overrides.url.clone();
    params.method = overrides.method.clone();
    params.post_data = overrides
        .post_data
        .as_ref()
        .map(|data| BASE64.encode(data.as_bytes()).into());
    params.headers = overrides.headers.as_ref().map(|headers| {
        headers
            .iter()
            .map(|(name, value)| HeaderEntry {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    });
    params
}

// Pair responses with their originating requests and capture bodies once
// loading finishes. Body, text, and JSON capture are each best-effort.
async fn spawn_response_observer(
    page: &Page,
    ledger: &Arc<Mutex<NetworkLedger>>,
) -> Result<JoinHandle<()>> {
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut finished = page.event_listener::<EventLoadingFinished>().await?;
    let page = page.clone();
    let ledger = Arc::clone(ledger);
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = responses.next() => {
                    let record = response_from_event(&event);
                    let status = record.status;
                    let key = request_key(&event.request_id);
                    let matched = ledger.lock().attach_response(&key, &event.response.url, record);
                    match matched {
                        Some(_) => debug!("Response {} received for {}", status, event.response.url),
                        None => debug!("Unmatched response for {}", event.response.url),
                    }
                }
                Some(event) = finished.next() => {
                    let key = request_key(&event.request_id);
                    let (body, text, json) = capture_body(&page, &event.request_id).await;
                    ledger.lock().attach_body(&key, body, text, json);
                }
                else => break,
            }
        }
    }))
}

fn response_from_event(event: &EventResponseReceived) -> ResponseRecord {
    let response = &event.response;
    let mut record = ResponseRecord::new(response.status as u16, response.status_text.clone());
    record.headers = headers_to_map(response.headers.inner());
    record.remote_address = match (&response.remote_ip_address, &response.remote_port) {
        (Some(ip), Some(port)) => Some(RemoteAddress {
            ip: ip.clone(),
            port: *port as u16,
        }),
        _ => None,
    };
    record.security_details = response.security_details.as_ref().map(|details| SecurityDetails {
        protocol: details.protocol.clone(),
        key_exchange: details.key_exchange.clone(),
        cipher: details.cipher.clone(),
        subject_name: details.subject_name.clone(),
        issuer: details.issuer.clone(),
    });
    record
}

// Best-effort body capture: bytes, then UTF-8 text, then JSON, each
// independently fallible. Failures leave the fields unset and never
// surface.
async fn capture_body(
    page: &Page,
    request_id: &network::RequestId,
) -> (Option<Vec<u8>>, Option<String>, Option<serde_json::Value>) {
    let body = match page
        .execute(GetResponseBodyParams::new(request_id.clone()))
        .await
    {
        Ok(response) => {
            let returns = &response.result;
            if returns.base64_encoded {
                BASE64.decode(&returns.body).ok()
            } else {
                Some(returns.body.clone().into_bytes())
            }
        }
        Err(e) => {
            debug!("Body capture unavailable: {}", e);
            None
        }
    };
    let text = body
        .as_ref()
        .and_then(|bytes| String::from_utf8(bytes.clone()).ok());
    let json = text.as_deref().and_then(|t| serde_json::from_str(t).ok());
    (body, text, json)
}
