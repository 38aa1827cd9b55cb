//! Per-session network ledger
//!
//! One `RequestRecord` per observed request, in arrival order. Responses are
//! paired to the first unmatched record with the same url and method, so
//! duplicate requests to one endpoint pair with their responses in issuance
//! order. Records are the serialization contract for captured traffic.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use std::collections::HashMap;

/// What the interception layer did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestOutcome {
    /// No interception action applied (pass-through or observe-only)
    #[default]
    Pending,
    /// Request was aborted by a rule
    Aborted,
    /// Request was answered with a caller-supplied fixture
    Responded,
    /// Request was forwarded with overrides
    Forwarded,
}

/// One observed network request
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    /// CDP resource type (Document, Script, Xhr, ...)
    pub resource_type: String,
    /// Interception outcome
    pub outcome: RequestOutcome,
    /// The matched response, once it arrives
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseRecord>,
}

impl RequestRecord {
    /// Build a record from the raw request fields
    pub fn new<U, M, R>(url: U, method: M, resource_type: R) -> Self
    where
        U: Into<String>,
        M: Into<String>,
        R: Into<String>,
    {
        Self {
            url: url.into(),
            method: method.into(),
            headers: HashMap::new(),
            post_data: None,
            resource_type: resource_type.into(),
            outcome: RequestOutcome::Pending,
            response: None,
        }
    }
}

/// Remote endpoint a response was served from
#[derive(Debug, Clone, Serialize)]
pub struct RemoteAddress {
    /// Remote IP address
    pub ip: String,
    /// Remote port
    pub port: u16,
}

/// TLS details for a secure response
#[derive(Debug, Clone, Serialize)]
pub struct SecurityDetails {
    /// Protocol name, e.g. "TLS 1.3"
    pub protocol: String,
    /// Key exchange algorithm
    pub key_exchange: String,
    /// Cipher name
    pub cipher: String,
    /// Certificate subject
    pub subject_name: String,
    /// Certificate issuer
    pub issuer: String,
}

/// One observed network response, attached to its matched request
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    /// HTTP status code
    pub status: u16,
    /// HTTP status text
    pub status_text: String,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Whether the status is in the 2xx range
    pub ok: bool,
    /// Remote endpoint, when reported by the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<RemoteAddress>,
    /// TLS details; absent for non-TLS or when the engine denies access
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_details: Option<SecurityDetails>,
    /// Raw body bytes; capture is best-effort and may fail independently
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_base64"
    )]
    pub body: Option<Vec<u8>>,
    /// Body decoded as UTF-8, when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Best-effort JSON parse of the decoded text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
}

impl ResponseRecord {
    /// Build a response record with headers only; body fields stay unset
    /// until (and unless) capture succeeds.
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: HashMap::new(),
            ok: (200..300).contains(&status),
            remote_address: None,
            security_details: None,
            body: None,
            text: None,
            json: None,
        }
    }
}

fn serialize_opt_base64<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match bytes {
        Some(b) => serializer.serialize_some(&BASE64.encode(b)),
        None => serializer.serialize_none(),
    }
}

/// Convert a CDP headers object (a JSON map) into a string map.
/// Non-string values are stringified; non-object payloads yield an empty map.
pub fn headers_to_map(value: &serde_json::Value) -> HashMap<String, String> {
    match value.as_object() {
        Some(obj) => obj
            .iter()
            .map(|(k, v)| {
                let v = match v.as_str() {
                    Some(s) => s.to_string(),
                    None => v.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        None => HashMap::new(),
    }
}

/// Ordered request ledger for one session.
///
/// Owned exclusively by the session that created it; the session's observer
/// tasks and resolution path are its only mutators. Records are additionally
/// indexed by the engine's request id so the response observer can recover
/// the originating method before running the url+method match.
#[derive(Debug, Default)]
pub struct NetworkLedger {
    records: Vec<RequestRecord>,
    index_by_id: HashMap<String, usize>,
    matched_by_id: HashMap<String, usize>,
}

impl NetworkLedger {
    /// Append a record, keyed by the engine request id. Returns its index.
    pub fn record_request(&mut self, request_id: impl Into<String>, record: RequestRecord) -> usize {
        let index = self.records.len();
        self.records.push(record);
        self.index_by_id.insert(request_id.into(), index);
        index
    }

    /// Whether a record for this engine request id already exists.
    pub fn contains(&self, request_id: &str) -> bool {
        self.index_by_id.contains_key(request_id)
    }

    /// Tag the interception outcome of the record for this request id.
    pub fn set_outcome(&mut self, request_id: &str, outcome: RequestOutcome) {
        if let Some(&index) = self.index_by_id.get(request_id) {
            self.records[index].outcome = outcome;
        }
    }

    /// Attach a response to the first unmatched record whose url equals the
    /// response url and whose method equals the originating request's method.
    ///
    /// Returns the matched index, or `None` when the request id was never
    /// recorded or every candidate already carries a response.
    pub fn attach_response(
        &mut self,
        request_id: &str,
        url: &str,
        response: ResponseRecord,
    ) -> Option<usize> {
        let &origin = self.index_by_id.get(request_id)?;
        let method = self.records[origin].method.clone();
        let index = self
            .records
            .iter()
            .position(|r| r.url == url && r.method == method && r.response.is_none())?;
        self.records[index].response = Some(response);
        self.matched_by_id.insert(request_id.to_string(), index);
        Some(index)
    }

    /// Fill the best-effort body fields on the record this request id's
    /// response was matched to. Missing matches are ignored.
    pub fn attach_body(
        &mut self,
        request_id: &str,
        body: Option<Vec<u8>>,
        text: Option<String>,
        json: Option<serde_json::Value>,
    ) {
        if let Some(&index) = self.matched_by_id.get(request_id) {
            if let Some(response) = self.records[index].response.as_mut() {
                response.body = body;
                response.text = text;
                response.json = json;
            }
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read access to the records in arrival order
    pub fn records(&self) -> &[RequestRecord] {
        &self.records
    }

    /// Consume the ledger, yielding the records in arrival order
    pub fn into_records(self) -> Vec<RequestRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn get_record(url: &str) -> RequestRecord {
        RequestRecord::new(url, "GET", "Xhr")
    }

    #[test]
    fn test_records_preserve_arrival_order() {
        let mut ledger = NetworkLedger::default();
        ledger.record_request("1", get_record("https://a.test/one"));
        ledger.record_request("2", get_record("https://a.test/two"));
        ledger.record_request("3", get_record("https://a.test/three"));

        let urls: Vec<_> = ledger.records().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.test/one", "https://a.test/two", "https://a.test/three"]
        );
    }

    #[test]
    fn test_response_matches_url_and_method() {
        let mut ledger = NetworkLedger::default();
        ledger.record_request("1", get_record("https://a.test/data"));
        ledger.record_request("2", RequestRecord::new("https://a.test/data", "POST", "Xhr"));

        // The POST response must skip the GET record.
        let matched = ledger.attach_response("2", "https://a.test/data", ResponseRecord::new(201, "Created"));
        assert_eq!(matched, Some(1));
        assert!(ledger.records()[0].response.is_none());
        assert_eq!(ledger.records()[1].response.as_ref().unwrap().status, 201);
    }

    #[test]
    fn test_duplicate_requests_pair_fifo() {
        let mut ledger = NetworkLedger::default();
        ledger.record_request("1", get_record("https://a.test/poll"));
        ledger.record_request("2", get_record("https://a.test/poll"));

        // Responses arrive for the second request id first; pairing is still
        // first-unmatched-wins in ledger order.
        assert_eq!(
            ledger.attach_response("2", "https://a.test/poll", ResponseRecord::new(200, "OK")),
            Some(0)
        );
        assert_eq!(
            ledger.attach_response("1", "https://a.test/poll", ResponseRecord::new(304, "Not Modified")),
            Some(1)
        );
        assert_eq!(ledger.records()[0].response.as_ref().unwrap().status, 200);
        assert_eq!(ledger.records()[1].response.as_ref().unwrap().status, 304);
    }

    #[test]
    fn test_unknown_request_id_never_matches() {
        let mut ledger = NetworkLedger::default();
        ledger.record_request("1", get_record("https://a.test/"));
        assert_eq!(
            ledger.attach_response("99", "https://a.test/", ResponseRecord::new(200, "OK")),
            None
        );
    }

    #[test]
    fn test_attach_body_targets_matched_record() {
        let mut ledger = NetworkLedger::default();
        ledger.record_request("1", get_record("https://a.test/json"));
        ledger.attach_response("1", "https://a.test/json", ResponseRecord::new(200, "OK"));

        let payload = br#"{"answer":42}"#.to_vec();
        let text = String::from_utf8(payload.clone()).ok();
        let json = text.as_deref().and_then(|t| serde_json::from_str(t).ok());
        ledger.attach_body("1", Some(payload), text, json);

        let response = ledger.records()[0].response.as_ref().unwrap();
        assert_eq!(response.text.as_deref(), Some(r#"{"answer":42}"#));
        assert_eq!(response.json.as_ref().unwrap()["answer"], 42);
    }

    #[test]
    fn test_attach_body_without_match_is_ignored() {
        let mut ledger = NetworkLedger::default();
        ledger.record_request("1", get_record("https://a.test/"));
        ledger.attach_body("1", Some(vec![1, 2, 3]), None, None);
        assert!(ledger.records()[0].response.is_none());
    }

    #[test]
    fn test_set_outcome() {
        let mut ledger = NetworkLedger::default();
        ledger.record_request("1", get_record("https://a.test/ads.js"));
        ledger.set_outcome("1", RequestOutcome::Aborted);
        assert_eq!(ledger.records()[0].outcome, RequestOutcome::Aborted);
        // Unknown ids are a no-op.
        ledger.set_outcome("2", RequestOutcome::Responded);
    }

    #[test]
    fn test_response_ok_flag() {
        assert!(ResponseRecord::new(200, "OK").ok);
        assert!(ResponseRecord::new(204, "No Content").ok);
        assert!(!ResponseRecord::new(304, "Not Modified").ok);
        assert!(!ResponseRecord::new(404, "Not Found").ok);
    }

    #[test]
    fn test_headers_to_map() {
        let value = serde_json::json!({
            "content-type": "application/json",
            "content-length": 42,
        });
        let map = headers_to_map(&value);
        assert_eq!(map.get("content-type").unwrap(), "application/json");
        assert_eq!(map.get("content-length").unwrap(), "42");
        assert!(headers_to_map(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn test_record_serialization_shape() {
        let mut record = get_record("https://a.test/api");
        record.outcome = RequestOutcome::Responded;
        let mut response = ResponseRecord::new(404, "Not Found");
        response.body = Some(b"Not Found!".to_vec());
        response.text = Some("Not Found!".to_string());
        record.response = Some(response);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["outcome"], "responded");
        assert_eq!(value["response"]["status"], 404);
        assert_eq!(value["response"]["ok"], false);
        // Body bytes serialize as base64.
        assert_eq!(value["response"]["body"], BASE64.encode(b"Not Found!"));
        assert!(value["response"].get("json").is_none());
        assert!(value.get("post_data").is_none());
    }
}
