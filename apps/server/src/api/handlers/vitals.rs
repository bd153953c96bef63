//! Vital-sign entry: catalogue, range checks and batch creation

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use bedside_models::vitals::{
    self, Interpretation, NormalRange, RangeAssessment, VitalKind, DIASTOLIC_RANGE,
    SYSTOLIC_RANGE,
};
use bedside_models::{Bundle, BundleType};
use bedside_smart::VitalEntry;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueEntry {
    pub code: &'static str,
    pub display_name: &'static str,
    pub unit: &'static str,
    pub loinc_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_range: Option<NormalRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systolic_range: Option<NormalRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diastolic_range: Option<NormalRange>,
}

impl From<VitalKind> for CatalogueEntry {
    fn from(kind: VitalKind) -> Self {
        let blood_pressure = kind == VitalKind::BloodPressure;
        Self {
            code: kind.code(),
            display_name: kind.display_name(),
            unit: kind.display_unit(),
            loinc_code: kind.loinc_code(),
            normal_range: kind.normal_range(),
            systolic_range: blood_pressure.then_some(SYSTOLIC_RANGE),
            diastolic_range: blood_pressure.then_some(DIASTOLIC_RANGE),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckParams {
    pub code: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeCheck {
    pub code: String,
    pub value: String,
    pub assessments: Vec<Assessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<InterpretationView>,
}

#[derive(Debug, Serialize)]
pub struct InterpretationView {
    pub code: &'static str,
    pub text: &'static str,
}

impl From<Interpretation> for InterpretationView {
    fn from(flag: Interpretation) -> Self {
        Self {
            code: flag.code(),
            text: flag.text(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Assessment {
    pub assessment: RangeAssessment,
    pub message: String,
}

impl Assessment {
    fn of(range: &NormalRange, value: f64) -> Self {
        Self {
            assessment: range.assess(value),
            message: range.message(value),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateVitalsRequest {
    pub entries: Vec<VitalEntry>,
}

/// `GET /api/vitals/catalogue`
pub async fn catalogue() -> Json<Vec<CatalogueEntry>> {
    Json(VitalKind::ALL.into_iter().map(CatalogueEntry::from).collect())
}

/// `GET /api/vitals/check?code=heart-rate&value=110`
pub async fn check(Query(params): Query<CheckParams>) -> Result<Json<RangeCheck>> {
    let kind = VitalKind::from_code(&params.code)
        .ok_or_else(|| bedside_smart::Error::UnsupportedVitalType(params.code.clone()))?;
    let invalid = || bedside_smart::Error::InvalidVitalValue {
        code: params.code.clone(),
        value: params.value.clone(),
    };
    let number = |raw: &str| {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(invalid)
    };

    let (assessments, interpretation) = match kind.normal_range() {
        Some(range) => (vec![Assessment::of(&range, number(&params.value)?)], None),
        None => {
            let (systolic, diastolic) = params.value.split_once('/').ok_or_else(invalid)?;
            let (systolic, diastolic) = (number(systolic)?, number(diastolic)?);
            (
                vec![
                    Assessment::of(&SYSTOLIC_RANGE, systolic),
                    Assessment::of(&DIASTOLIC_RANGE, diastolic),
                ],
                Some(vitals::blood_pressure_interpretation(systolic, diastolic).into()),
            )
        }
    };

    Ok(Json(RangeCheck {
        code: params.code,
        value: params.value,
        assessments,
        interpretation,
    }))
}

/// `POST /api/vitals` creates one Observation per entry and returns them
/// in a collection Bundle.
pub async fn create_vitals(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<CreateVitalsRequest>,
) -> Result<(StatusCode, Json<Bundle>)> {
    if request.entries.is_empty() {
        return Err(Error::BadRequest("No vitals submitted".to_string()));
    }

    let smart = state.client(&jar)?;
    let session = smart.session()?;
    let creator = smart.observation_creator(session);
    let created = creator.create_vitals(&request.entries).await?;

    let mut bundle = Bundle::new(BundleType::Collection);
    for resource in created {
        bundle.add_resource(resource);
    }
    Ok((StatusCode::CREATED, Json(bundle)))
}
