use std::collections::BTreeMap;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::spec::{Body, ExpectedOutcome, RequestSpec};

/// One reason a verification did not pass. Every failure for a single call
/// is collected; nothing stops at the first mismatch.
#[derive(Debug, Error)]
pub enum Failure {
    /// The HTTP client could not complete the exchange. Never retried.
    #[error("transport failure: {cause}")]
    Transport { cause: String },
    /// The reply did not have the JSON shape the echo contract promises.
    #[error("protocol violation: {detail}")]
    Protocol { detail: String },
    /// A specific expectation did not hold.
    #[error("{field} mismatch: expected {expected}, got {actual}")]
    Mismatch {
        field: String,
        expected: String,
        actual: String,
    },
}

impl Failure {
    fn transport(err: &reqwest::Error) -> Self {
        use std::error::Error as _;

        let mut cause = err.to_string();
        let mut source = err.source();
        while let Some(inner) = source {
            cause.push_str(": ");
            cause.push_str(&inner.to_string());
            source = inner.source();
        }
        Failure::Transport { cause }
    }

    fn transport_unroutable(path: &str, err: url::ParseError) -> Self {
        Failure::Transport {
            cause: format!("cannot resolve request URL from path {path:?}: {err}"),
        }
    }

    fn protocol(detail: impl Into<String>) -> Self {
        Failure::Protocol {
            detail: detail.into(),
        }
    }

    fn mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Failure::Mismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Raw reply captured for diagnostics, regardless of pass/fail.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: u16,
    pub body: Option<Value>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub failures: Vec<Failure>,
    pub response: Option<CapturedResponse>,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    fn aborted(failure: Failure) -> Self {
        Self {
            failures: vec![failure],
            response: None,
        }
    }
}

/// Sends one request per [`RequestSpec`] through the injected client and
/// checks the echoed reply against an [`ExpectedOutcome`]. Stateless; safe to
/// share across concurrent callers.
#[derive(Debug, Clone)]
pub struct EchoVerifier {
    client: Client,
    base_url: Url,
}

impl EchoVerifier {
    /// Timeouts, pooling, and TLS are the client's configuration, not ours.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn verify(
        &self,
        spec: &RequestSpec,
        expected: &ExpectedOutcome,
    ) -> VerificationResult {
        let mut url = match self.base_url.join(&spec.path) {
            Ok(url) => url,
            Err(err) => {
                return VerificationResult::aborted(Failure::transport_unroutable(&spec.path, err))
            }
        };
        if !spec.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &spec.query {
                pairs.append_pair(name, value);
            }
        }

        let mut builder = self.client.request(spec.method.into(), url.clone());
        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }
        builder = match &spec.body {
            Some(Body::Json { json }) => builder.json(json),
            Some(Body::Text { text, content_type }) => builder
                .header(
                    reqwest::header::CONTENT_TYPE,
                    content_type.as_deref().unwrap_or("text/plain"),
                )
                .body(text.clone()),
            None => builder,
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return VerificationResult::aborted(Failure::transport(&err)),
        };

        let status = response.status().as_u16();
        let raw = match response.bytes().await {
            Ok(raw) => raw,
            Err(err) => return VerificationResult::aborted(Failure::transport(&err)),
        };

        let body: Value = match serde_json::from_slice(&raw) {
            Ok(body) => body,
            Err(err) => {
                return VerificationResult {
                    failures: vec![Failure::protocol(format!(
                        "response body is not valid JSON: {err}"
                    ))],
                    response: Some(CapturedResponse { status, body: None }),
                }
            }
        };

        let mut failures = Vec::new();
        check_status(&mut failures, expected.status, status);
        if expected.url_echoes_request {
            check_url(&mut failures, &url, &body);
        }
        if let Some(args) = &expected.args {
            check_args(&mut failures, args, &body);
        }
        match &spec.body {
            Some(Body::Json { json }) => check_json_echo(&mut failures, json, &body),
            Some(Body::Text { text, .. }) => check_text_echo(&mut failures, text, &body),
            None => {}
        }
        check_headers(&mut failures, &expected.headers, &body);

        VerificationResult {
            failures,
            response: Some(CapturedResponse {
                status,
                body: Some(body),
            }),
        }
    }
}

fn check_status(failures: &mut Vec<Failure>, expected: u16, actual: u16) {
    if actual != expected {
        failures.push(Failure::mismatch(
            "status",
            expected.to_string(),
            actual.to_string(),
        ));
    }
}

fn check_url(failures: &mut Vec<Failure>, requested: &Url, body: &Value) {
    match body.get("url") {
        Some(Value::String(echoed)) => {
            if echoed != requested.as_str() {
                failures.push(Failure::mismatch(
                    "url",
                    requested.as_str().to_string(),
                    echoed.clone(),
                ));
            }
        }
        Some(other) => failures.push(Failure::mismatch(
            "url",
            requested.as_str().to_string(),
            other.to_string(),
        )),
        None => failures.push(Failure::protocol("response is missing the \"url\" field")),
    }
}

/// Exact-map equality: extra keys, missing keys, and value mismatches are
/// each reported individually.
fn check_args(failures: &mut Vec<Failure>, expected: &BTreeMap<String, String>, body: &Value) {
    let echoed = match body.get("args").and_then(Value::as_object) {
        Some(echoed) => echoed,
        None => {
            failures.push(Failure::protocol(
                "response is missing the \"args\" mapping",
            ));
            return;
        }
    };

    for (name, expected_value) in expected {
        match echoed.get(name) {
            Some(actual) => {
                let actual = coerce_to_text(actual);
                if &actual != expected_value {
                    failures.push(Failure::mismatch(
                        format!("args[{name:?}]"),
                        expected_value.clone(),
                        actual,
                    ));
                }
            }
            None => failures.push(Failure::mismatch(
                format!("args[{name:?}]"),
                expected_value.clone(),
                "absent".to_string(),
            )),
        }
    }

    for (name, actual) in echoed {
        if !expected.contains_key(name) {
            failures.push(Failure::mismatch(
                format!("args[{name:?}]"),
                "absent".to_string(),
                coerce_to_text(actual),
            ));
        }
    }
}

fn check_json_echo(failures: &mut Vec<Failure>, sent: &Value, body: &Value) {
    match body.get("json") {
        Some(echoed) => {
            if echoed != sent {
                failures.push(Failure::mismatch(
                    "json",
                    sent.to_string(),
                    echoed.to_string(),
                ));
            }
        }
        None => failures.push(Failure::protocol("response is missing the \"json\" field")),
    }

    // The exact shape of `data` after a JSON send is unspecified; the one
    // thing the contract rules out is a JSON object/array serialization.
    match body.get("data") {
        None | Some(Value::Null) => {}
        Some(Value::String(text)) => {
            if looks_like_json_container(text) {
                failures.push(Failure::mismatch(
                    "data",
                    "absent, null, or a plain string".to_string(),
                    format!("JSON-shaped string {text:?}"),
                ));
            }
        }
        Some(other) => failures.push(Failure::mismatch(
            "data",
            "absent, null, or a plain string".to_string(),
            other.to_string(),
        )),
    }
}

fn check_text_echo(failures: &mut Vec<Failure>, sent: &str, body: &Value) {
    match body.get("data") {
        Some(Value::String(echoed)) => {
            // Byte-for-byte, no trimming.
            if echoed != sent {
                failures.push(Failure::mismatch(
                    "data",
                    format!("{sent:?}"),
                    format!("{echoed:?}"),
                ));
            }
        }
        Some(other) => failures.push(Failure::mismatch(
            "data",
            format!("{sent:?}"),
            other.to_string(),
        )),
        None => failures.push(Failure::protocol("response is missing the \"data\" field")),
    }

    match body.get("json") {
        None | Some(Value::Null) => {}
        Some(other) => failures.push(Failure::mismatch(
            "json",
            "null".to_string(),
            other.to_string(),
        )),
    }
}

/// Expected names are looked up case-insensitively; echo services reflect
/// header names case-folded.
fn check_headers(failures: &mut Vec<Failure>, expected: &BTreeMap<String, String>, body: &Value) {
    if expected.is_empty() {
        return;
    }

    let echoed = match body.get("headers").and_then(Value::as_object) {
        Some(echoed) => echoed,
        None => {
            failures.push(Failure::protocol(
                "response is missing the \"headers\" mapping",
            ));
            return;
        }
    };

    for (name, expected_value) in expected {
        let found = echoed
            .iter()
            .find(|(echoed_name, _)| echoed_name.eq_ignore_ascii_case(name));
        match found {
            Some((_, actual)) => {
                let actual = coerce_to_text(actual);
                if &actual != expected_value {
                    failures.push(Failure::mismatch(
                        format!("headers[{name:?}]"),
                        expected_value.clone(),
                        actual,
                    ));
                }
            }
            None => failures.push(Failure::mismatch(
                format!("headers[{name:?}]"),
                expected_value.clone(),
                "absent".to_string(),
            )),
        }
    }
}

fn coerce_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn looks_like_json_container(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(text),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn check_status_reports_mismatch() {
        let mut failures = Vec::new();
        check_status(&mut failures, 200, 500);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].to_string(), "status mismatch: expected 200, got 500");
    }

    #[test]
    fn check_args_accepts_exact_match() {
        let mut failures = Vec::new();
        let expected = map(&[("name", "Alex"), ("city", "Москва")]);
        let body = json!({"args": {"name": "Alex", "city": "Москва"}});

        check_args(&mut failures, &expected, &body);
        assert!(failures.is_empty());
    }

    #[test]
    fn check_args_reports_missing_extra_and_changed_keys() {
        let mut failures = Vec::new();
        let expected = map(&[("name", "Alex"), ("age", "25")]);
        let body = json!({"args": {"name": "alex", "debug": "1"}});

        check_args(&mut failures, &expected, &body);
        let messages: Vec<String> = failures.iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().any(|m| m.contains("args[\"age\"]") && m.contains("absent")));
        assert!(messages.iter().any(|m| m.contains("args[\"name\"]") && m.contains("alex")));
        assert!(messages.iter().any(|m| m.contains("args[\"debug\"]")));
    }

    #[test]
    fn check_args_requires_the_args_mapping() {
        let mut failures = Vec::new();
        check_args(&mut failures, &map(&[]), &json!({"url": "x"}));
        assert!(matches!(failures.as_slice(), [Failure::Protocol { .. }]));
    }

    #[test]
    fn check_args_coerces_non_string_values_to_text() {
        let mut failures = Vec::new();
        let expected = map(&[("age", "25")]);
        check_args(&mut failures, &expected, &json!({"args": {"age": 25}}));
        assert!(failures.is_empty());
    }

    #[test]
    fn check_json_echo_deep_compares_nested_values() {
        let sent = json!({"user_id": 123, "preferences": {"theme": "dark", "notifications": true}});
        let mut failures = Vec::new();
        check_json_echo(&mut failures, &sent, &json!({"json": sent.clone(), "data": null}));
        assert!(failures.is_empty());

        check_json_echo(
            &mut failures,
            &sent,
            &json!({"json": {"user_id": 123, "preferences": {"theme": "light", "notifications": true}}, "data": null}),
        );
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().starts_with("json mismatch"));
    }

    #[test]
    fn check_json_echo_flags_json_shaped_data_string() {
        let sent = json!({"user_id": 123});
        let mut failures = Vec::new();
        check_json_echo(
            &mut failures,
            &sent,
            &json!({"json": sent.clone(), "data": "{\"user_id\":123}"}),
        );
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().contains("data"));
    }

    #[test]
    fn check_json_echo_tolerates_empty_or_absent_data() {
        let sent = json!({"a": 1});
        for body in [
            json!({"json": {"a": 1}}),
            json!({"json": {"a": 1}, "data": null}),
            json!({"json": {"a": 1}, "data": ""}),
        ] {
            let mut failures = Vec::new();
            check_json_echo(&mut failures, &sent, &body);
            assert!(failures.is_empty(), "unexpected failures for {body}");
        }
    }

    #[test]
    fn check_text_echo_requires_byte_identical_data_and_null_json() {
        let mut failures = Vec::new();
        check_text_echo(
            &mut failures,
            "Hello from Python!",
            &json!({"data": "Hello from Python!", "json": null}),
        );
        assert!(failures.is_empty());

        check_text_echo(
            &mut failures,
            "Hello from Python!",
            &json!({"data": "Hello from Python! ", "json": {"oops": true}}),
        );
        let messages: Vec<String> = failures.iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("data"));
        assert!(messages[1].contains("json"));
    }

    #[test]
    fn check_headers_matches_case_insensitively() {
        let mut failures = Vec::new();
        let expected = map(&[("X-API-Key", "abc123xyz"), ("User-Agent", "MyCustomBot/1.0")]);
        let body = json!({"headers": {"x-api-key": "abc123xyz", "user-agent": "MyCustomBot/1.0"}});

        check_headers(&mut failures, &expected, &body);
        assert!(failures.is_empty());
    }

    #[test]
    fn check_headers_reports_absent_and_changed_values() {
        let mut failures = Vec::new();
        let expected = map(&[("X-API-Key", "abc123xyz"), ("X-Client", "echovet")]);
        let body = json!({"headers": {"x-api-key": "different"}});

        check_headers(&mut failures, &expected, &body);
        let messages: Vec<String> = failures.iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.contains("X-API-Key") && m.contains("different")));
        assert!(messages.iter().any(|m| m.contains("X-Client") && m.contains("absent")));
    }

    #[test]
    fn check_url_compares_the_resolved_request_url() {
        let requested = Url::parse("https://echo.test/get").unwrap();
        let mut failures = Vec::new();
        check_url(&mut failures, &requested, &json!({"url": "https://echo.test/get"}));
        assert!(failures.is_empty());

        check_url(&mut failures, &requested, &json!({"url": "https://echo.test/other"}));
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn looks_like_json_container_only_matches_objects_and_arrays() {
        assert!(looks_like_json_container("{\"a\":1}"));
        assert!(looks_like_json_container("[1,2]"));
        assert!(!looks_like_json_container("plain text"));
        assert!(!looks_like_json_container("42"));
        assert!(!looks_like_json_container("\"quoted\""));
    }
}
