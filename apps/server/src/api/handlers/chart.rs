//! Read-only chart views for the launched patient

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use bedside_models::vitals::{self, VitalReading};
use bedside_models::PatientSummary;
use bedside_smart::{FetchState, ResourceQuery, SmartClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub patient_id: String,
    pub issuer: String,
    pub need_patient_banner: bool,
    pub patient: PatientSummary,
}

#[derive(Debug, Default, Deserialize)]
pub struct VitalsParams {
    /// Observation category, `vital-signs` when absent
    pub category: Option<String>,
    /// Only readings whose label matches exactly
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VitalsView {
    pub labels: Vec<String>,
    pub readings: Vec<ReadingView>,
}

#[derive(Debug, Serialize)]
pub struct ReadingView {
    #[serde(flatten)]
    pub reading: VitalReading,
    pub abnormal: bool,
}

#[derive(Debug, Serialize)]
pub struct AllergiesView {
    pub total: usize,
    pub allergies: Vec<Value>,
}

/// Run one fetch for the browser's session
async fn load(smart: &SmartClient, query: ResourceQuery) -> Result<Vec<Value>> {
    let session = smart.session()?;
    let fetcher = smart.fetcher(session, query);
    match fetcher.fetch().await {
        FetchState::Done(resources) => Ok(resources),
        FetchState::Failed(e) => Err(e.into()),
        other => Err(Error::Internal(format!("fetch finished in state {other:?}"))),
    }
}

async fn load_patient(smart: &SmartClient) -> Result<Value> {
    load(smart, ResourceQuery::Patient)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound("Patient".to_string()))
}

/// `GET /home`
pub async fn dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Dashboard>> {
    let smart = state.client(&jar)?;
    let session = smart.session()?;
    let patient = load_patient(&smart).await?;
    let today = chrono::Local::now().date_naive();

    Ok(Json(Dashboard {
        patient_id: session.patient_id().to_string(),
        issuer: session.issuer().to_string(),
        need_patient_banner: session.need_patient_banner(),
        patient: PatientSummary::from_resource(&patient, today)?,
    }))
}

/// `GET /api/patient`
pub async fn patient(State(state): State<AppState>, jar: CookieJar) -> Result<Json<Value>> {
    let smart = state.client(&jar)?;
    Ok(Json(load_patient(&smart).await?))
}

/// `GET /api/vitals`
pub async fn list_vitals(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<VitalsParams>,
) -> Result<Json<VitalsView>> {
    let smart = state.client(&jar)?;
    let query = match params.category {
        Some(category) => ResourceQuery::ObservationsByCategory { category },
        None => ResourceQuery::vital_signs(),
    };
    let observations = load(&smart, query).await?;

    let readings: Vec<VitalReading> = observations
        .iter()
        .map(VitalReading::from_observation)
        .collect();
    let labels = vitals::distinct_labels(&readings);

    let readings = readings
        .into_iter()
        .filter(|r| match &params.label {
            Some(label) => r.label.as_deref() == Some(label.as_str()),
            None => true,
        })
        .map(|reading| ReadingView {
            abnormal: reading.is_abnormal(),
            reading,
        })
        .collect();

    Ok(Json(VitalsView { labels, readings }))
}

/// `GET /api/allergies`
pub async fn allergies(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<AllergiesView>> {
    let smart = state.client(&jar)?;
    let allergies = load(&smart, ResourceQuery::AllergyIntolerances).await?;
    Ok(Json(AllergiesView {
        total: allergies.len(),
        allergies,
    }))
}
