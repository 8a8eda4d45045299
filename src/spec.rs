use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Methods the echo contract covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(value: Method) -> Self {
        match value {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// Request payload. JSON and text bodies are mutually exclusive; the kind
/// decides which response field (`json` or `data`) the verifier inspects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Json {
        json: Value,
    },
    Text {
        text: String,
        #[serde(rename = "contentType", default)]
        content_type: Option<String>,
    },
}

impl Body {
    pub fn json(value: Value) -> Self {
        Body::Json { json: value }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Body::Text {
            text: content.into(),
            content_type: None,
        }
    }

    pub fn text_as(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Body::Text {
            text: content.into(),
            content_type: Some(content_type.into()),
        }
    }
}

/// What to send. Immutable per scenario; the target base URL is supplied by
/// the verifier so the same spec can run against different hosts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Body>,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }
}

/// What the echoed reply must look like. Header names are matched
/// case-insensitively; `args`, when given, must match the reflected mapping
/// exactly (same keys, same values).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpectedOutcome {
    pub status: u16,
    pub args: Option<BTreeMap<String, String>>,
    pub headers: BTreeMap<String, String>,
    /// When set, the reflected `url` field must equal the resolved request
    /// URL exactly.
    pub url_echoes_request: bool,
}

impl Default for ExpectedOutcome {
    fn default() -> Self {
        Self {
            status: 200,
            args: None,
            headers: BTreeMap::new(),
            url_echoes_request: false,
        }
    }
}

impl ExpectedOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Expect the reflected `args` to equal exactly the query map sent.
    pub fn with_args_from(mut self, request: &RequestSpec) -> Self {
        self.args = Some(request.query.clone());
        self
    }

    pub fn with_args(mut self, args: BTreeMap<String, String>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn echoing_url(mut self) -> Self {
        self.url_echoes_request = true;
        self
    }
}

/// One data-driven row: a request to send and the reply to expect.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub request: RequestSpec,
    #[serde(default)]
    pub expected: ExpectedOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scenario_deserializes_with_defaults() {
        let scenario: Scenario = serde_json::from_value(json!({
            "name": "ping",
            "request": {"method": "GET", "path": "/get"}
        }))
        .unwrap();

        assert_eq!(scenario.name, "ping");
        assert_eq!(scenario.request.method, Method::Get);
        assert!(scenario.request.query.is_empty());
        assert!(scenario.request.body.is_none());
        assert_eq!(scenario.expected.status, 200);
        assert!(scenario.expected.args.is_none());
        assert!(!scenario.expected.url_echoes_request);
    }

    #[test]
    fn body_deserializes_json_and_text_variants() {
        let json_body: Body = serde_json::from_value(json!({"json": {"ok": true}})).unwrap();
        assert!(matches!(json_body, Body::Json { .. }));

        let text_body: Body =
            serde_json::from_value(json!({"text": "hi", "contentType": "text/plain"})).unwrap();
        match text_body {
            Body::Text { text, content_type } => {
                assert_eq!(text, "hi");
                assert_eq!(content_type.as_deref(), Some("text/plain"));
            }
            Body::Json { .. } => panic!("expected text body"),
        }
    }

    #[test]
    fn expected_outcome_accepts_camel_case_keys() {
        let expected: ExpectedOutcome = serde_json::from_value(json!({
            "status": 201,
            "args": {"a": "1"},
            "urlEchoesRequest": true
        }))
        .unwrap();

        assert_eq!(expected.status, 201);
        assert_eq!(expected.args.unwrap().get("a").map(String::as_str), Some("1"));
        assert!(expected.url_echoes_request);
    }

    #[test]
    fn builders_compose_request_and_expectation() {
        let request = RequestSpec::get("/get")
            .with_query("name", "Alex")
            .with_header("X-Client", "echovet");
        let expected = ExpectedOutcome::ok().with_args_from(&request);

        assert_eq!(request.query.get("name").map(String::as_str), Some("Alex"));
        assert_eq!(
            expected.args.unwrap().get("name").map(String::as_str),
            Some("Alex")
        );
    }
}
