use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde_json::json;

use crate::{
    spec::{Body, ExpectedOutcome, Method, RequestSpec, Scenario},
    verifier::{EchoVerifier, VerificationResult},
};

pub struct SuiteReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

pub struct ScenarioOutcome {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub result: VerificationResult,
}

impl SuiteReport {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.passed())
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }
}

/// Runs scenarios one at a time; every row is independent and nothing is
/// shared between calls beyond the injected client.
pub async fn run_suite(verifier: &EchoVerifier, scenarios: &[Scenario]) -> SuiteReport {
    let mut outcomes = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let result = verifier.verify(&scenario.request, &scenario.expected).await;
        outcomes.push(ScenarioOutcome {
            name: scenario.name.clone(),
            method: scenario.request.method,
            path: scenario.request.path.clone(),
            result,
        });
    }
    SuiteReport { outcomes }
}

/// Loads a scenario table from a JSON array file.
pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading scenario file {}", path.display()))?;
    let scenarios: Vec<Scenario> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing scenario file {}", path.display()))?;
    Ok(scenarios)
}

/// The stock conformance table for a postman-echo style service.
pub fn builtin_scenarios() -> Vec<Scenario> {
    let query_request = RequestSpec::get("/get")
        .with_query("name", "Alex")
        .with_query("age", "25")
        .with_query("city", "Москва")
        .with_query("active", "true");
    let query_expected = ExpectedOutcome::ok().with_args_from(&query_request);

    vec![
        Scenario {
            name: "get-empty".to_string(),
            request: RequestSpec::get("/get"),
            expected: ExpectedOutcome::ok()
                .with_args(BTreeMap::new())
                .echoing_url(),
        },
        Scenario {
            name: "get-query-params".to_string(),
            request: query_request,
            expected: query_expected,
        },
        Scenario {
            name: "post-json".to_string(),
            request: RequestSpec::post("/post").with_body(Body::json(json!({
                "user_id": 123,
                "username": "test_user",
                "preferences": {
                    "theme": "dark",
                    "notifications": true
                }
            }))),
            expected: ExpectedOutcome::ok(),
        },
        Scenario {
            name: "post-plain-text".to_string(),
            request: RequestSpec::post("/post")
                .with_body(Body::text_as("Hello from Python!", "text/plain")),
            expected: ExpectedOutcome::ok(),
        },
        Scenario {
            name: "custom-headers-reflected".to_string(),
            request: RequestSpec::get("/get")
                .with_header("X-API-Key", "abc123xyz")
                .with_header("X-Client", "echovet")
                .with_header("Accept-Language", "en-US,en;q=0.9")
                .with_header("User-Agent", "MyCustomBot/1.0"),
            expected: ExpectedOutcome::ok()
                .with_header("X-API-Key", "abc123xyz")
                .with_header("X-Client", "echovet")
                .with_header("Accept-Language", "en-US,en;q=0.9")
                .with_header("User-Agent", "MyCustomBot/1.0"),
        },
        Scenario {
            name: "large-json-body".to_string(),
            request: RequestSpec::post("/post").with_body(Body::json(large_json_value(50))),
            expected: ExpectedOutcome::ok(),
        },
    ]
}

fn large_json_value(keys: usize) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = (0..keys)
        .map(|i| (format!("key_{i}"), json!(format!("value_{i}"))))
        .collect();
    serde_json::Value::Object(map)
}
