//! Batch creation of vital-sign Observations

use crate::error::{Error, Result};
use crate::fhir::FhirClient;
use bedside_models::vitals::{self, VitalKind};
use bedside_models::Observation;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One vital submitted from the entry form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalEntry {
    /// Form code, e.g. `heart-rate`
    pub code: String,
    /// Numeric value; blood pressure uses `"<systolic>/<diastolic>"`
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective: Option<DateTime<Utc>>,
}

impl VitalEntry {
    pub fn new(code: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
            effective: None,
        }
    }
}

/// Build the Observation for one entry; `now` is used when the entry has no time.
pub fn observation_for_entry(
    patient_id: &str,
    entry: &VitalEntry,
    now: DateTime<Utc>,
) -> Result<Observation> {
    let kind = VitalKind::from_code(&entry.code)
        .ok_or_else(|| Error::UnsupportedVitalType(entry.code.clone()))?;
    let effective = entry.effective.unwrap_or(now);

    let observation = match kind {
        VitalKind::BloodPressure => {
            let (systolic, diastolic) = entry
                .value
                .split_once('/')
                .ok_or_else(|| invalid_value(entry))?;
            vitals::blood_pressure(
                patient_id,
                parse_number(systolic, entry)?,
                parse_number(diastolic, entry)?,
                effective,
            )
        }
        VitalKind::HeartRate => {
            vitals::heart_rate(patient_id, parse_number(&entry.value, entry)?, effective)
        }
        VitalKind::BodyTemperature => {
            vitals::body_temperature(patient_id, parse_number(&entry.value, entry)?, effective)
        }
        VitalKind::RespiratoryRate => {
            vitals::respiratory_rate(patient_id, parse_number(&entry.value, entry)?, effective)
        }
        VitalKind::OxygenSaturation => {
            vitals::oxygen_saturation(patient_id, parse_number(&entry.value, entry)?, effective)
        }
        VitalKind::BodyWeight => {
            vitals::body_weight(patient_id, parse_number(&entry.value, entry)?, effective)
        }
        VitalKind::Bmi => vitals::bmi(patient_id, parse_number(&entry.value, entry)?, effective),
    };
    Ok(observation)
}

fn parse_number(raw: &str, entry: &VitalEntry) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid_value(entry))
}

fn invalid_value(entry: &VitalEntry) -> Error {
    Error::InvalidVitalValue {
        code: entry.code.clone(),
        value: entry.value.clone(),
    }
}

/// Submits batches of vitals for the session's patient.
///
/// Every entry is converted before the first POST, so an unsupported or
/// malformed entry rejects the batch without touching the server. The
/// POSTs then run concurrently; the first failure rejects the batch and
/// Observations already created stay on the server.
#[derive(Debug)]
pub struct ObservationCreator {
    client: FhirClient,
    /// Batches currently posting
    in_flight: AtomicUsize,
    last_error: Mutex<Option<Error>>,
}

impl ObservationCreator {
    pub fn new(client: FhirClient) -> Self {
        Self {
            client,
            in_flight: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn is_creating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Error of the most recent batch, cleared when a new batch starts
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn create_vitals(&self, entries: &[VitalEntry]) -> Result<Vec<Value>> {
        let _in_flight = InFlightBatch::enter(&self.in_flight);
        self.set_last_error(None);

        let result = self.submit(entries).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, entries = entries.len(), "Vital batch failed");
            self.set_last_error(Some(e.clone()));
        }
        result
    }

    async fn submit(&self, entries: &[VitalEntry]) -> Result<Vec<Value>> {
        let patient_id = self.client.session().patient_id();
        let now = Utc::now();
        let observations = entries
            .iter()
            .map(|entry| observation_for_entry(patient_id, entry, now))
            .collect::<Result<Vec<_>>>()?;

        let created = try_join_all(
            observations
                .iter()
                .map(|observation| self.client.create_observation(observation)),
        )
        .await?;

        tracing::info!(count = created.len(), "Created vital-sign Observations");
        Ok(created)
    }

    fn set_last_error(&self, error: Option<Error>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }
}

struct InFlightBatch<'a>(&'a AtomicUsize);

impl<'a> InFlightBatch<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightBatch<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
