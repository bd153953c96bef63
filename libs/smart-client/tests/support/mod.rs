//! In-process mock of an EHR: SMART discovery, token endpoint and FHIR API.
//!
//! Every request is recorded; responses are queued per `(method, path)` and
//! the last queued response repeats.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use bedside_smart::{ClientStorage, SmartAppConfig, SmartClient, SmartSession};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: StatusCode,
    pub body: Value,
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: None,
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status"),
            body,
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct Shared {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<HashMap<(Method, String), VecDeque<MockResponse>>>,
}

pub struct MockEhr {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl MockEhr {
    /// Start a server with the SMART configuration document already mounted.
    pub async fn start() -> anyhow::Result<Self> {
        let shared = Arc::new(Shared::default());
        let app = Router::new().fallback(record).with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let ehr = Self {
            base_url: format!("http://{}", addr),
            shared,
        };
        ehr.respond(
            Method::GET,
            "/.well-known/smart-configuration",
            MockResponse::ok(json!({
                "authorization_endpoint": format!("{}/authorize", ehr.base_url),
                "token_endpoint": format!("{}/token", ehr.base_url),
                "capabilities": ["launch-ehr", "client-public", "context-ehr-patient"]
            })),
        );
        Ok(ehr)
    }

    /// Queue a response for `method path`
    pub fn respond(&self, method: Method, path: &str, response: MockResponse) {
        self.shared
            .responses
            .lock()
            .expect("responses lock")
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Replace the queue for `method path`
    pub fn reset(&self, method: Method, path: &str) {
        self.shared
            .responses
            .lock()
            .expect("responses lock")
            .remove(&(method, path.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// FHIR base URL, also used as `iss`
    pub fn issuer(&self) -> String {
        format!("{}/fhir", self.base_url)
    }

    pub fn client(&self, storage: ClientStorage) -> SmartClient {
        let config = SmartAppConfig {
            redirect_uri: "http://localhost:3000/callback".to_string(),
            request_timeout_secs: 5,
            ..SmartAppConfig::default()
        };
        SmartClient::new(config, storage).expect("http client")
    }

    pub fn session(&self) -> SmartSession {
        SmartSession::new(self.issuer(), "test-access-token", "p1")
    }
}

async fn record(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    shared.requests.lock().expect("requests lock").push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let response = {
        let mut responses = shared.responses.lock().expect("responses lock");
        match responses.get_mut(&(method, path)) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };

    match response {
        Some(response) => {
            if let Some(delay) = response.delay {
                tokio::time::sleep(delay).await;
            }
            (response.status, Json(response.body)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "resourceType": "OperationOutcome",
                "issue": [{"severity": "error", "code": "not-found"}]
            })),
        )
            .into_response(),
    }
}

pub fn searchset(resources: Vec<Value>) -> Value {
    let entries: Vec<Value> = resources
        .into_iter()
        .map(|resource| json!({"resource": resource, "search": {"mode": "match"}}))
        .collect();
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": entries.len(),
        "entry": entries
    })
}
