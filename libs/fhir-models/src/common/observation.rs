//! FHIR Observation model and builder
//!
//! Only the parts of Observation that the client authors are modelled here.
//! Observations fetched from a server are kept as `serde_json::Value`.

use super::complex::*;
use super::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Code system for Observation categories
pub const OBSERVATION_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";

/// Code system for Observation interpretations
pub const OBSERVATION_INTERPRETATION_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation";

/// FHIR Observation resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Resource type - always "Observation"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    /// Logical id, assigned by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Business identifier
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    pub status: ObservationStatus,

    /// Classification of type of observation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,

    /// Type of observation (code / type)
    pub code: CodeableConcept,

    /// Who the observation is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    /// Clinically relevant time, ISO-8601 in UTC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,

    /// High, low, normal, etc.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interpretation: Vec<CodeableConcept>,

    /// Provides guide for interpretation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_range: Vec<ObservationReferenceRange>,

    /// Component results
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component: Vec<ObservationComponent>,
}

fn default_resource_type() -> String {
    "Observation".to_string()
}

/// Status of an Observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationStatus {
    Registered,
    Preliminary,
    Final,
    Amended,
    Corrected,
    Cancelled,
    EnteredInError,
    Unknown,
}

/// Component of a composite Observation (e.g. systolic/diastolic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationComponent {
    pub code: CodeableConcept,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interpretation: Vec<CodeableConcept>,
}

/// Reference range for an Observation value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationReferenceRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Quantity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Quantity>,
}

/// Input for one component of a composite Observation
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentValue {
    pub code: CodeableConcept,
    pub value: f64,
    /// Human readable unit
    pub unit: String,
    /// UCUM code; `unit` is used when absent
    pub unit_code: Option<String>,
}

impl Observation {
    /// Parse from JSON Value
    pub fn from_value(value: &Value) -> Result<Self> {
        let observation: Self = serde_json::from_value(value.clone())?;
        if observation.resource_type != "Observation" {
            return Err(Error::UnexpectedResourceType {
                expected: "Observation".to_string(),
                actual: observation.resource_type,
            });
        }
        Ok(observation)
    }

    /// Convert to JSON Value
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::from)
    }

    /// Whether the Observation is filed under the given category code
    pub fn has_category(&self, code: &str) -> bool {
        self.category.iter().any(|c| c.has_code(code))
    }

    /// Find a component by any of its codes
    pub fn component_by_code(&self, code: &str) -> Option<&ObservationComponent> {
        self.component.iter().find(|c| c.code.has_code(code))
    }
}

/// Render a timestamp the way FHIR `dateTime` values are written by this client
/// (`2024-05-01T08:30:00.000Z`).
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builder for vital-sign Observations
///
/// Starts from a `final` Observation in the `vital-signs` category. Every
/// setter takes the builder by value, so a finished Observation can never be
/// changed through the builder that produced it.
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    observation: Observation,
    effective: Option<DateTime<Utc>>,
}

impl Default for ObservationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationBuilder {
    pub fn new() -> Self {
        let vital_signs = CodeableConcept {
            coding: vec![Coding::new(OBSERVATION_CATEGORY_SYSTEM, "vital-signs")
                .with_display("Vital Signs")],
            text: Some("Vital Signs".to_string()),
        };

        Self {
            observation: Observation {
                resource_type: default_resource_type(),
                id: None,
                identifier: Vec::new(),
                status: ObservationStatus::Final,
                category: vec![vital_signs],
                code: CodeableConcept::default(),
                subject: None,
                effective_date_time: None,
                value_quantity: None,
                interpretation: Vec::new(),
                reference_range: Vec::new(),
                component: Vec::new(),
            },
            effective: None,
        }
    }

    pub fn identifier(mut self, system: impl Into<String>, value: impl Into<String>) -> Self {
        self.observation.identifier = vec![Identifier {
            system: Some(system.into()),
            value: Some(value.into()),
        }];
        self
    }

    pub fn status(mut self, status: ObservationStatus) -> Self {
        self.observation.status = status;
        self
    }

    /// Add a category next to the default `vital-signs` one
    pub fn category(mut self, coding: Coding) -> Self {
        self.observation
            .category
            .push(CodeableConcept::from_coding(coding));
        self
    }

    /// Set `code`; text defaults to the first coding's display
    pub fn codes(mut self, codes: Vec<Coding>, text: Option<&str>) -> Self {
        self.observation.code = CodeableConcept::from_codings(codes, text.map(str::to_string));
        self
    }

    pub fn subject(mut self, patient_id: &str) -> Self {
        self.observation.subject = Some(Reference::patient(patient_id));
        self
    }

    pub fn effective(mut self, instant: DateTime<Utc>) -> Self {
        self.effective = Some(instant);
        self
    }

    pub fn value(mut self, value: f64, unit: &str, system: &str, code: &str) -> Self {
        self.observation.value_quantity = Some(Quantity {
            value,
            unit: Some(unit.to_string()),
            system: Some(system.to_string()),
            code: Some(code.to_string()),
        });
        self
    }

    /// Set the component list; each quantity is expressed in UCUM
    pub fn components(mut self, components: Vec<ComponentValue>) -> Self {
        self.observation.component = components
            .into_iter()
            .map(|c| {
                let unit_code = c.unit_code.unwrap_or_else(|| c.unit.clone());
                ObservationComponent {
                    code: c.code,
                    value_quantity: Some(Quantity::ucum(c.value, &c.unit, &unit_code)),
                    interpretation: Vec::new(),
                }
            })
            .collect();
        self
    }

    pub fn interpretation(mut self, coding: Coding) -> Self {
        self.observation.interpretation = vec![CodeableConcept::from_coding(coding)];
        self
    }

    pub fn reference_range(mut self, low: f64, high: f64, unit: &str) -> Self {
        self.observation.reference_range = vec![ObservationReferenceRange {
            low: Some(Quantity::ucum(low, unit, unit)),
            high: Some(Quantity::ucum(high, unit, unit)),
        }];
        self
    }

    /// Finish the Observation; the effective time defaults to now
    pub fn build(self) -> Observation {
        let mut observation = self.observation;
        let effective = self.effective.unwrap_or_else(Utc::now);
        observation.effective_date_time = Some(format_instant(&effective));
        observation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let observation = ObservationBuilder::new().subject("p1").build();

        assert_eq!(observation.resource_type, "Observation");
        assert_eq!(observation.status, ObservationStatus::Final);
        assert!(observation.has_category("vital-signs"));
        assert_eq!(
            observation.subject.unwrap().reference.as_deref(),
            Some("Patient/p1")
        );
        assert!(observation.effective_date_time.is_some());
    }

    #[test]
    fn test_effective_date_time_is_millisecond_utc() {
        let observation = ObservationBuilder::new().effective(fixed_instant()).build();
        assert_eq!(
            observation.effective_date_time.as_deref(),
            Some("2024-03-09T14:05:07.000Z")
        );
    }

    #[test]
    fn test_code_text_falls_back_to_first_display() {
        let observation = ObservationBuilder::new()
            .codes(
                vec![
                    Coding::loinc("29463-7", "Body weight"),
                    Coding::loinc("3141-9", "Body weight Measured"),
                ],
                None,
            )
            .build();
        assert_eq!(observation.code.text.as_deref(), Some("Body weight"));

        let observation = ObservationBuilder::new()
            .codes(vec![Coding::new(LOINC_SYSTEM, "8331-1")], Some("Temperature Oral"))
            .build();
        assert_eq!(observation.code.text.as_deref(), Some("Temperature Oral"));
    }

    #[test]
    fn test_component_unit_code_defaults_to_unit() {
        let observation = ObservationBuilder::new()
            .components(vec![ComponentValue {
                code: CodeableConcept::from_coding(Coding::loinc("8480-6", "Systolic")),
                value: 110.0,
                unit: "mm[Hg]".to_string(),
                unit_code: None,
            }])
            .build();

        let quantity = observation.component[0].value_quantity.as_ref().unwrap();
        assert_eq!(quantity.code.as_deref(), Some("mm[Hg]"));
        assert_eq!(quantity.system.as_deref(), Some(UCUM_SYSTEM));
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let observation = ObservationBuilder::new()
            .codes(vec![Coding::loinc("8867-4", "Heart rate")], None)
            .subject("p1")
            .effective(fixed_instant())
            .value(72.0, "beats/minute", UCUM_SYSTEM, "/min")
            .build();

        let json = observation.to_value().unwrap();
        assert_eq!(json["resourceType"], "Observation");
        assert_eq!(json["status"], "final");
        assert_eq!(json["valueQuantity"]["code"], "/min");
        assert!(json.get("component").is_none());
        assert!(json.get("referenceRange").is_none());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_from_value_rejects_other_resource_types() {
        let result = Observation::from_value(&json!({
            "resourceType": "Patient",
            "status": "final",
            "code": {}
        }));
        assert!(matches!(
            result,
            Err(Error::UnexpectedResourceType { .. })
        ));
    }

    #[test]
    fn test_from_value_reads_server_observation() {
        let observation = Observation::from_value(&json!({
            "resourceType": "Observation",
            "id": "obs-1",
            "status": "amended",
            "code": {"coding": [{"system": "http://loinc.org", "code": "8867-4"}]},
            "valueQuantity": {"value": 64, "unit": "beats/minute"}
        }))
        .unwrap();

        assert_eq!(observation.id.as_deref(), Some("obs-1"));
        assert_eq!(observation.status, ObservationStatus::Amended);
        assert_eq!(observation.value_quantity.unwrap().value, 64.0);
    }
}
