//! Shared helpers for router tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, Request, Response, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use bedside_server::{api::create_router, session::SESSION_COOKIE, AppState, Config};
use bedside_smart::{keys, ClientStorage, KeyValueStore};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> anyhow::Result<Self> {
        let state = AppState::new(config)?;
        Ok(Self {
            router: create_router(state.clone()),
            state,
        })
    }

    /// Open a browser session holding credentials as if a callback had
    /// completed, and return its `Cookie` header value.
    pub fn authorize(&self, issuer: &str) -> anyhow::Result<String> {
        let (smart, cookie) = self.state.start_session()?;
        let durable = &smart.storage().durable;
        durable.set(keys::ACCESS_TOKEN, "test-access-token")?;
        durable.set(keys::PATIENT, "p1")?;
        durable.set(keys::ISSUER, issuer)?;
        Ok(format!("{}={}", cookie.name(), cookie.value()))
    }

    /// Stores of the browser session named by a `Cookie` header value
    pub fn storage(&self, cookie: &str) -> Option<ClientStorage> {
        let id = cookie.strip_prefix(&format!("{SESSION_COOKIE}="))?;
        self.state.sessions.get(id)
    }

    pub async fn get(&self, uri: &str) -> anyhow::Result<Response<Body>> {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn get_as(&self, uri: &str, cookie: &str) -> anyhow::Result<Response<Body>> {
        self.send(Method::GET, uri, Some(cookie), None).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        cookie: Option<&str>,
        body: Value,
    ) -> anyhow::Result<Response<Body>> {
        self.send(Method::POST, uri, cookie, Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<Response<Body>> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => request.body(Body::empty())?,
        };
        Ok(self.router.clone().oneshot(request).await?)
    }
}

pub async fn body_json(response: Response<Body>) -> anyhow::Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `name=value` of the session cookie set by a response
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{SESSION_COOKIE}=")))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Query parameter `key` of an absolute URL
pub fn query_param(url: &str, key: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

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

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct Shared {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<HashMap<(Method, String), VecDeque<(StatusCode, Value)>>>,
}

/// In-process EHR: SMART discovery, token endpoint and FHIR API at one base
/// URL. Responses are queued per `(method, path)`; the last one repeats.
pub struct MockEhr {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl MockEhr {
    pub async fn start() -> anyhow::Result<Self> {
        let shared = Arc::new(Shared::default());
        let app = Router::new().fallback(record).with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let ehr = Self { base_url, shared };
        ehr.respond(
            Method::GET,
            "/.well-known/smart-configuration",
            200,
            json!({
                "authorization_endpoint": format!("{}/authorize", ehr.base_url),
                "token_endpoint": format!("{}/token", ehr.base_url),
                "capabilities": ["launch-ehr", "client-public"]
            }),
        );
        Ok(ehr)
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).expect("valid status");
        self.shared
            .responses
            .lock()
            .expect("responses lock")
            .entry((method, path.to_string()))
            .or_default()
            .push_back((status, body));
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.shared
            .requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    /// `/launch` URL for this EHR
    pub fn launch_uri(&self, launch: &str) -> String {
        format!(
            "/launch?iss={}&launch={}",
            urlencoding::encode(&self.base_url),
            launch
        )
    }
}

async fn record(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response<Body> {
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
        Some((status, body)) => (status, Json(body)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"resourceType": "OperationOutcome"})))
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
