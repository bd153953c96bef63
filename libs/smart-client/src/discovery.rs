//! SMART configuration discovery (`/.well-known/smart-configuration`)

use crate::error::{status_line, Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The parts of the SMART configuration document the launch needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartConfiguration {
    pub authorization_endpoint: String,
    pub token_endpoint: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Remaining fields of the document
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

pub fn well_known_url(issuer: &str) -> String {
    format!(
        "{}/.well-known/smart-configuration",
        issuer.trim_end_matches('/')
    )
}

/// Fetch and parse the issuer's SMART configuration.
pub async fn discover(http: &Client, issuer: &str) -> Result<SmartConfiguration> {
    let url = well_known_url(issuer);
    tracing::debug!(url = %url, "Fetching SMART configuration");

    let response = http
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| Error::DiscoveryFailure(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::DiscoveryFailure(status_line(response.status())));
    }

    let configuration: SmartConfiguration = response
        .json()
        .await
        .map_err(|e| Error::DiscoveryFailure(format!("invalid configuration document: {}", e)))?;

    if configuration.authorization_endpoint.is_empty() || configuration.token_endpoint.is_empty() {
        return Err(Error::DiscoveryFailure(
            "configuration document lacks authorization or token endpoint".to_string(),
        ));
    }

    tracing::info!(
        issuer = %issuer,
        authorization_endpoint = %configuration.authorization_endpoint,
        token_endpoint = %configuration.token_endpoint,
        "Discovered SMART endpoints"
    );
    Ok(configuration)
}
