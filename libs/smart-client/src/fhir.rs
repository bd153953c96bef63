//! Bearer-authenticated FHIR REST calls

use crate::error::{status_line, Error, Result};
use crate::session::SmartSession;
use bedside_models::{resources_from_response, Observation};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;

const FHIR_JSON: &str = "application/fhir+json";

/// Patient-scoped reads the dashboard performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceQuery {
    /// `Patient/<id>`
    Patient,
    /// `Observation?patient=<id>&category=<category>&_sort=-date`
    ObservationsByCategory { category: String },
    /// `AllergyIntolerance?patient=<id>`
    AllergyIntolerances,
}

impl ResourceQuery {
    pub fn vital_signs() -> Self {
        ResourceQuery::ObservationsByCategory {
            category: "vital-signs".to_string(),
        }
    }

    /// Resource type kept from the response
    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceQuery::Patient => "Patient",
            ResourceQuery::ObservationsByCategory { .. } => "Observation",
            ResourceQuery::AllergyIntolerances => "AllergyIntolerance",
        }
    }

    /// Path relative to the FHIR base
    pub fn path(&self, patient_id: &str) -> String {
        let patient = urlencoding::encode(patient_id);
        match self {
            ResourceQuery::Patient => format!("Patient/{}", patient),
            ResourceQuery::ObservationsByCategory { category } => format!(
                "Observation?patient={}&category={}&_sort=-date",
                patient,
                urlencoding::encode(category)
            ),
            ResourceQuery::AllergyIntolerances => {
                format!("AllergyIntolerance?patient={}", patient)
            }
        }
    }
}

/// FHIR client bound to one session
#[derive(Debug, Clone)]
pub struct FhirClient {
    http: Client,
    session: SmartSession,
}

impl FhirClient {
    pub fn new(http: Client, session: SmartSession) -> Self {
        Self { http, session }
    }

    pub fn session(&self) -> &SmartSession {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.session.fhir_base(), path.trim_start_matches('/'))
    }

    /// GET a path and return the JSON body; failures are `FetchFailure`
    /// tagged with `resource`.
    pub async fn get_json(&self, path: &str, resource: &str) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!(url = %url, "FHIR read");

        let fetch_failure = |status: Option<u16>, message: String| Error::FetchFailure {
            resource: resource.to_string(),
            status,
            message,
        };

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.session.access_token())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| fetch_failure(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failure(Some(status.as_u16()), status_line(status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| fetch_failure(Some(status.as_u16()), e.to_string()))
    }

    /// Run a query and flatten the response to resources of the expected type.
    pub async fn search(&self, query: &ResourceQuery) -> Result<Vec<Value>> {
        let resource_type = query.resource_type();
        let response = self
            .get_json(&query.path(self.session.patient_id()), resource_type)
            .await?;

        resources_from_response(response, resource_type).map_err(|e| Error::FetchFailure {
            resource: resource_type.to_string(),
            status: None,
            message: e.to_string(),
        })
    }

    /// POST an Observation; returns the server's representation (or `{}`
    /// when the server answers with an empty body).
    pub async fn create_observation(&self, observation: &Observation) -> Result<Value> {
        let url = self.url("Observation");
        let code = observation
            .code
            .coding
            .first()
            .and_then(|c| c.code.as_deref())
            .unwrap_or_default();
        tracing::debug!(url = %url, code = %code, "Creating Observation");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.session.access_token())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, FHIR_JSON)
            .json(observation)
            .send()
            .await
            .map_err(|e| Error::CreateFailure {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Observation create rejected");
            return Err(Error::CreateFailure {
                status: Some(status.as_u16()),
                message: status_line(status),
            });
        }

        let body = response.text().await.map_err(|e| Error::CreateFailure {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;
        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&body).map_err(|e| Error::CreateFailure {
            status: Some(status.as_u16()),
            message: format!("invalid response body: {}", e),
        })
    }
}
