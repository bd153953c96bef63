//! SMART app registration

use crate::error::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CLIENT_ID: &str = "91360c07-2b70-422b-bf6e-62cbd402f145";

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/callback";

/// Read/write permissions on the clinical resources the dashboard touches
pub const DEFAULT_SCOPE: &str = "openid fhirUser launch offline_access \
user/DocumentReference.read user/DocumentReference.write \
user/Encounter.read user/Encounter.write \
user/Observation.read user/Observation.write \
user/Patient.read user/Patient.write user/Person.read \
patient/Condition.read patient/Condition.write \
patient/Encounter.read patient/Encounter.write \
patient/Immunization.read patient/Immunization.write \
patient/Observation.read patient/Observation.write \
patient/Patient.read patient/Patient.write \
patient/Procedure.read patient/Procedure.write";

/// Registration of this app with the authorization server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartAppConfig {
    pub client_id: String,
    /// Absolute URL of the callback route
    pub redirect_uri: String,
    pub scope: String,
    /// Route to navigate to after a successful token exchange
    pub dashboard_path: String,
    pub request_timeout_secs: u64,
}

impl Default for SmartAppConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            dashboard_path: "/home".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl SmartAppConfig {
    /// HTTP client shared by discovery, token exchange and FHIR calls
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "client_id must not be empty".to_string(),
            ));
        }
        url::Url::parse(&self.redirect_uri)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scope_is_space_separated() {
        let config = SmartAppConfig::default();
        assert!(config.scope.starts_with("openid fhirUser launch offline_access "));
        assert!(config.scope.ends_with("patient/Procedure.write"));
        assert!(!config.scope.contains("  "));
        assert_eq!(config.scope.split(' ').count(), 25);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: SmartAppConfig =
            serde_json::from_str(r#"{"redirect_uri": "https://app.example.org/callback"}"#)
                .unwrap();
        assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(config.redirect_uri, "https://app.example.org/callback");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_redirect() {
        let config = SmartAppConfig {
            redirect_uri: "/callback".to_string(),
            ..SmartAppConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_rejects_blank_client_id() {
        let config = SmartAppConfig {
            client_id: "  ".to_string(),
            ..SmartAppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
