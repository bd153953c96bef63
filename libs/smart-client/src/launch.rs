//! EHR launch: discovery, CSRF state and the authorization redirect

use crate::config::SmartAppConfig;
use crate::discovery::{discover, SmartConfiguration};
use crate::error::{Error, Result};
use crate::storage::{keys, ClientStorage};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use reqwest::Client;
use url::Url;

/// `iss` and `launch` from the EHR's launch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub iss: String,
    pub launch: String,
}

impl LaunchParams {
    /// Parse a raw query string (`iss=...&launch=...`); empty values count as missing.
    pub fn from_query(query: &str) -> Result<Self> {
        let mut iss = None;
        let mut launch = None;
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match &*key {
                "iss" if !value.is_empty() => iss = Some(value.into_owned()),
                "launch" if !value.is_empty() => launch = Some(value.into_owned()),
                _ => {}
            }
        }
        match (iss, launch) {
            (Some(iss), Some(launch)) => Ok(Self { iss, launch }),
            _ => Err(Error::MissingLaunchParameters),
        }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        Self::from_query(url.query().unwrap_or_default())
    }
}

/// Where to send the user next
#[derive(Debug, Clone)]
pub struct LaunchRedirect {
    pub authorize_url: String,
    /// CSRF token also stored under `authState`
    pub state: String,
    pub configuration: SmartConfiguration,
}

/// 16 random bytes, base64url without padding
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn authorize_url(
    authorization_endpoint: &str,
    config: &SmartAppConfig,
    state: &str,
    params: &LaunchParams,
) -> String {
    let separator = if authorization_endpoint.contains('?') {
        '&'
    } else {
        '?'
    };
    format!(
        "{}{}response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&aud={}&launch={}",
        authorization_endpoint,
        separator,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scope),
        urlencoding::encode(state),
        urlencoding::encode(&params.iss),
        urlencoding::encode(&params.launch),
    )
}

/// Run the launch step.
///
/// Persists the issuer and the discovered endpoints, stores a fresh CSRF
/// token in session storage and returns the authorization redirect. The
/// caller performs the navigation.
pub async fn launch(
    http: &Client,
    config: &SmartAppConfig,
    storage: &ClientStorage,
    params: &LaunchParams,
) -> Result<LaunchRedirect> {
    storage.durable.set(keys::ISSUER, &params.iss)?;

    let configuration = discover(http, &params.iss).await.map_err(|e| {
        tracing::warn!(issuer = %params.iss, error = %e, "SMART discovery failed");
        e
    })?;

    storage
        .durable
        .set(keys::AUTH_ENDPOINT, &configuration.authorization_endpoint)?;
    storage
        .durable
        .set(keys::TOKEN_ENDPOINT, &configuration.token_endpoint)?;

    let state = generate_state();
    storage.session.set(keys::AUTH_STATE, &state)?;

    let authorize_url = authorize_url(
        &configuration.authorization_endpoint,
        config,
        &state,
        params,
    );
    tracing::info!(issuer = %params.iss, "Redirecting to authorization endpoint");

    Ok(LaunchRedirect {
        authorize_url,
        state,
        configuration,
    })
}
