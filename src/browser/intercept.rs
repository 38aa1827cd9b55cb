//! Request interception policy
//!
//! Caller-supplied rules are evaluated in order against each request URL;
//! the first rule whose fragment is contained in the URL decides what
//! happens. A rule carries exactly one action. Loose JSON rule files (where
//! `abort`, `respond`, and `overrides` are sibling optional keys) are
//! accepted at the deserialization boundary with precedence
//! abort > respond > overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canned response used to answer a matched request without hitting the
/// network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFixture {
    /// HTTP status code (default 200)
    #[serde(default = "default_status")]
    pub status: u16,
    /// Content-Type header value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseFixture {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: None,
            body: None,
        }
    }
}

/// Overrides applied to a matched request before it is forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOverrides {
    /// Replacement URL (redirect target)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Replacement HTTP method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Replacement request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    /// Replacement headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// The single action a rule applies to a matched request.
#[derive(Debug, Clone)]
pub enum RuleAction {
    /// Abort the request; it never reaches the network
    Abort,
    /// Answer with a fixture; the request never reaches the network
    Respond(ResponseFixture),
    /// Apply overrides, then let the request proceed
    Forward(RequestOverrides),
    /// Match without acting (the request proceeds untouched)
    PassThrough,
}

/// One interception rule: a URL fragment and the action for requests whose
/// URL contains it.
#[derive(Debug, Clone)]
pub struct InterceptRule {
    fragment: String,
    action: RuleAction,
}

impl InterceptRule {
    /// Rule that aborts matching requests
    pub fn abort(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            action: RuleAction::Abort,
        }
    }

    /// Rule that answers matching requests with a fixture
    pub fn respond(fragment: impl Into<String>, fixture: ResponseFixture) -> Self {
        Self {
            fragment: fragment.into(),
            action: RuleAction::Respond(fixture),
        }
    }

    /// Rule that forwards matching requests with overrides
    pub fn forward(fragment: impl Into<String>, overrides: RequestOverrides) -> Self {
        Self {
            fragment: fragment.into(),
            action: RuleAction::Forward(overrides),
        }
    }

    /// Rule that matches without acting
    pub fn observe(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            action: RuleAction::PassThrough,
        }
    }

    /// The URL fragment this rule matches on
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// The action this rule applies
    pub fn action(&self) -> &RuleAction {
        &self.action
    }
}

// Loose rule shape as it appears in rule files: sibling optional action keys.
// `responsed` is the historical spelling; `respond` is accepted as an alias.
#[derive(Deserialize)]
struct RawRule {
    url: String,
    #[serde(default)]
    abort: bool,
    #[serde(default, alias = "respond")]
    responsed: Option<ResponseFixture>,
    #[serde(default)]
    overrides: Option<RequestOverrides>,
}

impl<'de> Deserialize<'de> for InterceptRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawRule::deserialize(deserializer)?;
        let action = if raw.abort {
            RuleAction::Abort
        } else if let Some(fixture) = raw.responsed {
            RuleAction::Respond(fixture)
        } else if let Some(overrides) = raw.overrides {
            RuleAction::Forward(overrides)
        } else {
            RuleAction::PassThrough
        };
        Ok(InterceptRule {
            fragment: raw.url,
            action,
        })
    }
}

/// Decision produced by evaluating the rule list against one request URL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision<'a> {
    /// Abort the request
    Abort,
    /// Answer with this fixture
    Respond(&'a ResponseFixture),
    /// Forward with these overrides
    Forward(&'a RequestOverrides),
    /// Let the request proceed untouched
    PassThrough,
}

/// Scan `rules` in order; the first rule whose fragment is contained in
/// `request_url` wins. No match is a normal outcome: `PassThrough`.
pub fn evaluate<'a>(rules: &'a [InterceptRule], request_url: &str) -> Decision<'a> {
    for rule in rules {
        if request_url.contains(&rule.fragment) {
            return match &rule.action {
                RuleAction::Abort => Decision::Abort,
                RuleAction::Respond(fixture) => Decision::Respond(fixture),
                RuleAction::Forward(overrides) => Decision::Forward(overrides),
                RuleAction::PassThrough => Decision::PassThrough,
            };
        }
    }
    Decision::PassThrough
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            InterceptRule::abort("/a"),
            InterceptRule::respond("/a", ResponseFixture::default()),
        ];
        // Both rules match; the abort rule comes first and short-circuits.
        assert_eq!(evaluate(&rules, "https://site.test/a"), Decision::Abort);
    }

    #[test]
    fn test_no_match_is_pass_through() {
        let rules = vec![InterceptRule::abort("/blocked")];
        assert_eq!(
            evaluate(&rules, "https://site.test/allowed"),
            Decision::PassThrough
        );
        assert_eq!(evaluate(&[], "https://site.test/"), Decision::PassThrough);
    }

    #[test]
    fn test_substring_matching() {
        let rules = vec![InterceptRule::abort("/static/pingbi.js")];
        assert_eq!(
            evaluate(&rules, "https://site.test/static/pingbi.js?v=3"),
            Decision::Abort
        );
        assert_eq!(
            evaluate(&rules, "https://site.test/static/other.js"),
            Decision::PassThrough
        );
    }

    #[test]
    fn test_observe_rule_matches_without_acting() {
        let rules = vec![
            InterceptRule::observe("/tracked"),
            InterceptRule::abort("/tracked"),
        ];
        // The observe rule matches first, so the abort rule never runs.
        assert_eq!(
            evaluate(&rules, "https://site.test/tracked"),
            Decision::PassThrough
        );
    }

    #[test]
    fn test_forward_decision_carries_overrides() {
        let overrides = RequestOverrides {
            url: Some("https://mirror.test/api".to_string()),
            ..Default::default()
        };
        let rules = vec![InterceptRule::forward("/api", overrides.clone())];
        match evaluate(&rules, "https://site.test/api") {
            Decision::Forward(o) => assert_eq!(o, &overrides),
            other => panic!("expected Forward, got {:?}", other),
        }
    }

    #[test]
    fn test_loose_rule_deserialization() {
        let rule: InterceptRule =
            serde_json::from_str(r#"{"url": "/ads", "abort": true}"#).unwrap();
        assert!(matches!(rule.action(), RuleAction::Abort));

        let rule: InterceptRule = serde_json::from_str(
            r#"{"url": "/api", "responsed": {"status": 404, "content_type": "text/plain", "body": "Not Found!"}}"#,
        )
        .unwrap();
        match rule.action() {
            RuleAction::Respond(fixture) => {
                assert_eq!(fixture.status, 404);
                assert_eq!(fixture.body.as_deref(), Some("Not Found!"));
            }
            other => panic!("expected Respond, got {:?}", other),
        }

        let rule: InterceptRule = serde_json::from_str(
            r#"{"url": "/old", "overrides": {"url": "https://new.test/", "method": "POST"}}"#,
        )
        .unwrap();
        assert!(matches!(rule.action(), RuleAction::Forward(_)));

        // No action keys at all: the rule matches without acting.
        let rule: InterceptRule = serde_json::from_str(r#"{"url": "/just-watch"}"#).unwrap();
        assert!(matches!(rule.action(), RuleAction::PassThrough));
    }

    #[test]
    fn test_loose_rule_action_precedence() {
        // abort wins over respond, respond wins over overrides.
        let rule: InterceptRule = serde_json::from_str(
            r#"{"url": "/x", "abort": true, "responsed": {"status": 200}, "overrides": {"url": "https://y"}}"#,
        )
        .unwrap();
        assert!(matches!(rule.action(), RuleAction::Abort));

        let rule: InterceptRule = serde_json::from_str(
            r#"{"url": "/x", "responsed": {"status": 200}, "overrides": {"url": "https://y"}}"#,
        )
        .unwrap();
        assert!(matches!(rule.action(), RuleAction::Respond(_)));
    }

    #[test]
    fn test_respond_alias() {
        let rule: InterceptRule =
            serde_json::from_str(r#"{"url": "/api", "respond": {"status": 503}}"#).unwrap();
        match rule.action() {
            RuleAction::Respond(fixture) => assert_eq!(fixture.status, 503),
            other => panic!("expected Respond, got {:?}", other),
        }
    }

    #[test]
    fn test_fixture_defaults() {
        let fixture: ResponseFixture = serde_json::from_str("{}").unwrap();
        assert_eq!(fixture.status, 200);
        assert!(fixture.content_type.is_none());
        assert!(fixture.body.is_none());
    }
}
