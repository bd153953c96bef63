//! Authenticated session context

use crate::error::{Error, Result};
use crate::storage::{keys, KeyValueStore};
use std::fmt;

/// Credentials and patient context for FHIR calls.
///
/// Built once after the token exchange and handed to every data-access
/// component.
#[derive(Clone, PartialEq, Eq)]
pub struct SmartSession {
    issuer: String,
    access_token: String,
    patient_id: String,
    need_patient_banner: bool,
}

impl SmartSession {
    pub fn new(
        issuer: impl Into<String>,
        access_token: impl Into<String>,
        patient_id: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            access_token: access_token.into(),
            patient_id: patient_id.into(),
            need_patient_banner: false,
        }
    }

    /// Read the session from durable storage; every absent key is named in the error.
    pub fn from_store(store: &dyn KeyValueStore) -> Result<Self> {
        let mut missing = Vec::new();
        let mut read = |key: &str| -> Result<String> {
            match store.get(key)? {
                Some(value) if !value.is_empty() => Ok(value),
                _ => {
                    missing.push(key.to_string());
                    Ok(String::new())
                }
            }
        };

        let access_token = read(keys::ACCESS_TOKEN)?;
        let patient_id = read(keys::PATIENT)?;
        let issuer = read(keys::ISSUER)?;

        if !missing.is_empty() {
            return Err(Error::MissingCredentials { keys: missing });
        }

        let need_patient_banner = store
            .get(keys::NEED_PATIENT_BANNER)?
            .map(|v| v == "true")
            .unwrap_or(false);

        Ok(Self {
            issuer,
            access_token,
            patient_id,
            need_patient_banner,
        })
    }

    pub fn with_need_patient_banner(mut self, need_patient_banner: bool) -> Self {
        self.need_patient_banner = need_patient_banner;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issuer without a trailing slash, for joining resource paths
    pub fn fhir_base(&self) -> &str {
        self.issuer.trim_end_matches('/')
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn need_patient_banner(&self) -> bool {
        self.need_patient_banner
    }
}

impl fmt::Debug for SmartSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartSession")
            .field("issuer", &self.issuer)
            .field("access_token", &"<redacted>")
            .field("patient_id", &self.patient_id)
            .field("need_patient_banner", &self.need_patient_banner)
            .finish()
    }
}
