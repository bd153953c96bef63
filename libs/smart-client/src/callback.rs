//! Authorization callback: CSRF check and token exchange

use crate::config::SmartAppConfig;
use crate::error::{status_line, Error, Result};
use crate::storage::{keys, ClientStorage};
use reqwest::Client;
use serde_json::{Map, Value};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackState {
    Pending,
    Exchanging,
    Success(CallbackSuccess),
    Failed(Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackSuccess {
    /// Dashboard route to navigate to
    pub redirect_to: String,
    /// Token-response keys written to durable storage
    pub persisted_keys: Vec<String>,
}

/// Handles one authorization callback.
///
/// `handle` performs the exchange on its first call only; later calls return
/// the recorded outcome.
#[derive(Debug)]
pub struct CallbackHandler {
    http: Client,
    config: SmartAppConfig,
    storage: ClientStorage,
    state: CallbackState,
    debug_info: String,
    started: bool,
}

impl CallbackHandler {
    pub fn new(http: Client, config: SmartAppConfig, storage: ClientStorage) -> Self {
        Self {
            http,
            config,
            storage,
            state: CallbackState::Pending,
            debug_info: String::new(),
            started: false,
        }
    }

    pub fn state(&self) -> &CallbackState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, CallbackState::Pending | CallbackState::Exchanging)
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.state {
            CallbackState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Diagnostic transcript: callback URL, code, state, stored state and
    /// the raw failure body.
    pub fn debug_info(&self) -> &str {
        &self.debug_info
    }

    pub async fn handle(&mut self, callback_url: &str) -> &CallbackState {
        if self.started {
            return &self.state;
        }
        self.started = true;

        let outcome = self.run(callback_url).await;

        if let Err(e) = self.storage.session.remove(keys::AUTH_STATE) {
            tracing::warn!(error = %e, "Failed to discard CSRF state");
        }

        self.state = match outcome {
            Ok(success) => {
                tracing::info!(keys = ?success.persisted_keys, "Token exchange succeeded");
                CallbackState::Success(success)
            }
            Err(e) => {
                tracing::error!(error = %e, "Authorization callback failed");
                CallbackState::Failed(e)
            }
        };
        &self.state
    }

    async fn run(&mut self, callback_url: &str) -> Result<CallbackSuccess> {
        let url = Url::parse(callback_url)?;
        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match &*key {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }
        let stored_state = self.storage.session.get(keys::AUTH_STATE)?;

        self.debug_info = format!(
            "URL: {}\nCode: {}\nState: {}\nStored State: {}",
            url,
            code.as_deref().unwrap_or("null"),
            state.as_deref().unwrap_or("null"),
            stored_state.as_deref().unwrap_or("null"),
        );

        match (&state, &stored_state) {
            (Some(received), Some(stored)) if received == stored => {}
            _ => return Err(Error::CsrfMismatch),
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(Error::MissingAuthorizationCode)?;

        self.state = CallbackState::Exchanging;
        let token_response = self.exchange_code(&code).await?;

        let mut persisted_keys = Vec::with_capacity(token_response.len());
        for (key, value) in &token_response {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            self.storage.durable.set(key, &value)?;
            persisted_keys.push(key.clone());
        }

        self.debug_info.push_str(&format!(
            "\n\nToken Exchange Success:\nKeys: {}",
            persisted_keys.join(", ")
        ));

        Ok(CallbackSuccess {
            redirect_to: self.config.dashboard_path.clone(),
            persisted_keys,
        })
    }

    async fn exchange_code(&mut self, code: &str) -> Result<Map<String, Value>> {
        let token_endpoint = self
            .storage
            .durable
            .get(keys::TOKEN_ENDPOINT)?
            .ok_or_else(|| Error::TokenExchangeFailure {
                status: None,
                message: "no token endpoint stored; restart the launch".to_string(),
            })?;

        tracing::debug!(token_endpoint = %token_endpoint, "Exchanging authorization code");

        let response = self
            .http
            .post(&token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::TokenExchangeFailure {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.debug_info
                .push_str(&format!("\n\nError Response:\n{}", pretty_body(&body)));
            return Err(Error::TokenExchangeFailure {
                status: Some(status.as_u16()),
                message: status_line(status),
            });
        }

        response
            .json::<Map<String, Value>>()
            .await
            .map_err(|e| Error::TokenExchangeFailure {
                status: Some(status.as_u16()),
                message: format!("token response is not a JSON object: {}", e),
            })
    }
}

/// Pretty-print JSON bodies, pass anything else through
fn pretty_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}
