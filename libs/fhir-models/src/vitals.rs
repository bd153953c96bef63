//! Vital-sign templates
//!
//! One factory per recognized vital sign, each filling the fixed LOINC codes
//! and UCUM units into an [`ObservationBuilder`]. The catalogue in
//! [`VitalKind`] carries the display metadata and normal ranges used when
//! entering or listing vitals.

use crate::common::{
    CodeableConcept, Coding, ComponentValue, Observation, ObservationBuilder, LOINC_SYSTEM,
    OBSERVATION_INTERPRETATION_SYSTEM, SNOMED_SYSTEM, UCUM_SYSTEM,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub const HEART_RATE_CODE: &str = "8867-4";
pub const BLOOD_PRESSURE_PANEL_CODE: &str = "85354-9";
pub const SYSTOLIC_CODE: &str = "8480-6";
pub const DIASTOLIC_CODE: &str = "8462-4";
pub const BODY_TEMPERATURE_CODE: &str = "8331-1";
pub const RESPIRATORY_RATE_CODE: &str = "9279-1";
pub const OXYGEN_SATURATION_CODE: &str = "59408-5";
pub const OXYGEN_SATURATION_CATEGORY_CODE: &str = "2708-6";
pub const BODY_WEIGHT_CODE: &str = "29463-7";
pub const BODY_WEIGHT_MEASURED_CODE: &str = "3141-9";
pub const BMI_CODE: &str = "39156-5";

const ISO_11073_SYSTEM: &str = "urn:iso:std:iso:11073:10101";

/// The vital signs the client can record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VitalKind {
    HeartRate,
    BloodPressure,
    BodyTemperature,
    RespiratoryRate,
    OxygenSaturation,
    BodyWeight,
    Bmi,
}

impl VitalKind {
    pub const ALL: [VitalKind; 7] = [
        VitalKind::BloodPressure,
        VitalKind::HeartRate,
        VitalKind::BodyTemperature,
        VitalKind::RespiratoryRate,
        VitalKind::OxygenSaturation,
        VitalKind::BodyWeight,
        VitalKind::Bmi,
    ];

    /// Parse the form code used when vitals are submitted
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "heart-rate" => Some(Self::HeartRate),
            "blood-pressure" => Some(Self::BloodPressure),
            "temperature" => Some(Self::BodyTemperature),
            "respiratory-rate" => Some(Self::RespiratoryRate),
            "oxygen-saturation" => Some(Self::OxygenSaturation),
            "body-weight" => Some(Self::BodyWeight),
            "bmi" => Some(Self::Bmi),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::HeartRate => "heart-rate",
            Self::BloodPressure => "blood-pressure",
            Self::BodyTemperature => "temperature",
            Self::RespiratoryRate => "respiratory-rate",
            Self::OxygenSaturation => "oxygen-saturation",
            Self::BodyWeight => "body-weight",
            Self::Bmi => "bmi",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::HeartRate => "Heart Rate",
            Self::BloodPressure => "Blood Pressure",
            Self::BodyTemperature => "Body Temperature",
            Self::RespiratoryRate => "Respiratory Rate",
            Self::OxygenSaturation => "Oxygen Saturation",
            Self::BodyWeight => "Body weight",
            Self::Bmi => "Body Mass Index (BMI)",
        }
    }

    /// Unit shown next to entered values
    pub fn display_unit(self) -> &'static str {
        match self {
            Self::HeartRate => "bpm",
            Self::BloodPressure => "mmHg",
            Self::BodyTemperature => "°C",
            Self::RespiratoryRate => "breaths/min",
            Self::OxygenSaturation => "%",
            Self::BodyWeight => "kg",
            Self::Bmi => "kg/m2",
        }
    }

    /// Primary LOINC code of the Observation produced for this vital
    pub fn loinc_code(self) -> &'static str {
        match self {
            Self::HeartRate => HEART_RATE_CODE,
            Self::BloodPressure => BLOOD_PRESSURE_PANEL_CODE,
            Self::BodyTemperature => BODY_TEMPERATURE_CODE,
            Self::RespiratoryRate => RESPIRATORY_RATE_CODE,
            Self::OxygenSaturation => OXYGEN_SATURATION_CODE,
            Self::BodyWeight => BODY_WEIGHT_CODE,
            Self::Bmi => BMI_CODE,
        }
    }

    /// Normal range for single-valued vitals. Blood pressure uses
    /// [`SYSTOLIC_RANGE`] and [`DIASTOLIC_RANGE`] instead.
    pub fn normal_range(self) -> Option<NormalRange> {
        let unit = self.display_unit();
        let range = |min, max| Some(NormalRange { min, max, unit });
        match self {
            Self::BloodPressure => None,
            Self::HeartRate => range(60.0, 100.0),
            Self::BodyTemperature => range(36.1, 37.2),
            Self::RespiratoryRate => range(12.0, 20.0),
            Self::OxygenSaturation => range(95.0, 100.0),
            Self::BodyWeight => range(50.0, 100.0),
            Self::Bmi => range(18.5, 24.9),
        }
    }
}

impl fmt::Display for VitalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

pub const SYSTOLIC_RANGE: NormalRange = NormalRange {
    min: 90.0,
    max: 120.0,
    unit: "mmHg",
};

pub const DIASTOLIC_RANGE: NormalRange = NormalRange {
    min: 60.0,
    max: 80.0,
    unit: "mmHg",
};

/// Inclusive normal range of a vital sign
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalRange {
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeAssessment {
    Below,
    Within,
    Above,
}

impl NormalRange {
    pub fn assess(&self, value: f64) -> RangeAssessment {
        if value < self.min {
            RangeAssessment::Below
        } else if value > self.max {
            RangeAssessment::Above
        } else {
            RangeAssessment::Within
        }
    }

    /// Message shown while a value is being entered
    pub fn message(&self, value: f64) -> String {
        let position = match self.assess(value) {
            RangeAssessment::Below => "below",
            RangeAssessment::Within => "within",
            RangeAssessment::Above => "above",
        };
        format!(
            "Value is {} the normal range of {} - {} {}",
            position, self.min, self.max, self.unit
        )
    }
}

// ============================================================================
// Factories
// ============================================================================

pub fn heart_rate(patient_id: &str, value: f64, effective: DateTime<Utc>) -> Observation {
    ObservationBuilder::new()
        .category(Coding::loinc(HEART_RATE_CODE, "Heart rate"))
        .codes(vec![Coding::loinc(HEART_RATE_CODE, "Heart rate")], None)
        .subject(patient_id)
        .effective(effective)
        .value(value, "beats/minute", UCUM_SYSTEM, "/min")
        .build()
}

pub fn blood_pressure(
    patient_id: &str,
    systolic: f64,
    diastolic: f64,
    effective: DateTime<Utc>,
) -> Observation {
    let systolic_code = CodeableConcept {
        coding: vec![
            Coding::loinc(SYSTOLIC_CODE, "Systolic blood pressure"),
            Coding::new(SNOMED_SYSTEM, "271649006").with_display("Systolic blood pressure"),
        ],
        text: None,
    };
    let diastolic_code = CodeableConcept {
        coding: vec![Coding::loinc(DIASTOLIC_CODE, "Diastolic blood pressure")],
        text: None,
    };

    ObservationBuilder::new()
        .codes(
            vec![Coding::loinc(
                BLOOD_PRESSURE_PANEL_CODE,
                "Blood pressure panel with all children optional",
            )],
            Some("Blood pressure systolic & diastolic"),
        )
        .subject(patient_id)
        .effective(effective)
        .components(vec![
            ComponentValue {
                code: systolic_code,
                value: systolic,
                unit: "mmHg".to_string(),
                unit_code: Some("mm[Hg]".to_string()),
            },
            ComponentValue {
                code: diastolic_code,
                value: diastolic,
                unit: "mmHg".to_string(),
                unit_code: Some("mm[Hg]".to_string()),
            },
        ])
        .build()
}

pub fn body_temperature(patient_id: &str, value: f64, effective: DateTime<Utc>) -> Observation {
    ObservationBuilder::new()
        .codes(
            vec![Coding::new(LOINC_SYSTEM, BODY_TEMPERATURE_CODE)],
            Some("Temperature Oral"),
        )
        .subject(patient_id)
        .effective(effective)
        .value(value, "degC", UCUM_SYSTEM, "Cel")
        .build()
}

pub fn respiratory_rate(patient_id: &str, value: f64, effective: DateTime<Utc>) -> Observation {
    ObservationBuilder::new()
        .codes(
            vec![Coding::loinc(RESPIRATORY_RATE_CODE, "Respiratory Rate")],
            None,
        )
        .subject(patient_id)
        .effective(effective)
        .value(value, "breaths/minute", UCUM_SYSTEM, "/min")
        .build()
}

/// Pulse oximetry reading with the 90-99 % reference range attached
pub fn oxygen_saturation(patient_id: &str, value: f64, effective: DateTime<Utc>) -> Observation {
    ObservationBuilder::new()
        .category(Coding::loinc(
            OXYGEN_SATURATION_CATEGORY_CODE,
            "Oxygen saturation in Arterial blood",
        ))
        .codes(
            vec![
                Coding::loinc(
                    OXYGEN_SATURATION_CODE,
                    "Oxygen saturation in Arterial blood by Pulse oximetry",
                ),
                Coding::new(ISO_11073_SYSTEM, "150456").with_display("MDC_PULS_OXIM_SAT_O2"),
            ],
            None,
        )
        .subject(patient_id)
        .effective(effective)
        .value(value, "%", UCUM_SYSTEM, "%")
        .reference_range(90.0, 99.0, "%")
        .build()
}

pub fn body_weight(patient_id: &str, value: f64, effective: DateTime<Utc>) -> Observation {
    ObservationBuilder::new()
        .codes(
            vec![
                Coding::loinc(BODY_WEIGHT_CODE, "Body weight"),
                Coding::loinc(BODY_WEIGHT_MEASURED_CODE, "Body weight Measured"),
            ],
            Some("Weight Measured"),
        )
        .subject(patient_id)
        .effective(effective)
        .value(value, "kg", UCUM_SYSTEM, "kg")
        .build()
}

pub fn bmi(patient_id: &str, value: f64, effective: DateTime<Utc>) -> Observation {
    ObservationBuilder::new()
        .codes(
            vec![Coding::loinc(BMI_CODE, "Body mass index (BMI) [Ratio]")],
            None,
        )
        .subject(patient_id)
        .effective(effective)
        .value(value, "kg/m2", UCUM_SYSTEM, "kg/m2")
        .build()
}

// ============================================================================
// Blood pressure interpretation
// ============================================================================

/// v3 ObservationInterpretation flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Interpretation {
    Low,
    Normal,
    High,
}

impl Interpretation {
    pub fn code(self) -> &'static str {
        match self {
            Self::Low => "L",
            Self::Normal => "N",
            Self::High => "H",
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Low => "Below normal",
            Self::Normal => "Normal",
            Self::High => "Above normal",
        }
    }

    pub fn coding(self) -> Coding {
        Coding::new(OBSERVATION_INTERPRETATION_SYSTEM, self.code()).with_display(self.display())
    }

    fn concept(self) -> CodeableConcept {
        CodeableConcept {
            coding: vec![self.coding()],
            text: Some(self.text().to_string()),
        }
    }

    fn classify(value: f64, low_below: f64, high_above: f64) -> Self {
        if value < low_below {
            Self::Low
        } else if value > high_above {
            Self::High
        } else {
            Self::Normal
        }
    }
}

pub fn systolic_interpretation(systolic: f64) -> Interpretation {
    Interpretation::classify(systolic, 90.0, 140.0)
}

pub fn diastolic_interpretation(diastolic: f64) -> Interpretation {
    Interpretation::classify(diastolic, 60.0, 90.0)
}

/// Low wins over high when one side is low and the other high
pub fn blood_pressure_interpretation(systolic: f64, diastolic: f64) -> Interpretation {
    if systolic < 90.0 || diastolic < 60.0 {
        Interpretation::Low
    } else if systolic > 140.0 || diastolic > 90.0 {
        Interpretation::High
    } else {
        Interpretation::Normal
    }
}

pub fn is_abnormal_blood_pressure(systolic: f64, diastolic: f64) -> bool {
    systolic > 140.0 || diastolic > 90.0
}

/// [`blood_pressure`] with interpretations on the panel and on both components
pub fn blood_pressure_with_interpretation(
    patient_id: &str,
    systolic: f64,
    diastolic: f64,
    effective: DateTime<Utc>,
) -> Observation {
    let mut observation = blood_pressure(patient_id, systolic, diastolic, effective);
    observation.interpretation = vec![blood_pressure_interpretation(systolic, diastolic).concept()];
    for component in &mut observation.component {
        let flag = if component.code.has_code(SYSTOLIC_CODE) {
            systolic_interpretation(systolic)
        } else {
            diastolic_interpretation(diastolic)
        };
        component.interpretation = vec![flag.concept()];
    }
    observation
}

// ============================================================================
// Listing
// ============================================================================

/// A fetched vital-sign Observation flattened for tables and charts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalReading {
    pub id: Option<String>,
    pub effective: Option<String>,
    /// `code.text`, falling back to the first coding display
    pub label: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
}

impl VitalReading {
    pub fn from_observation(observation: &Value) -> Self {
        let label = observation
            .pointer("/code/text")
            .or_else(|| observation.pointer("/code/coding/0/display"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let components = observation
            .get("component")
            .and_then(|c| c.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let component_value = |code: &str| {
            components
                .iter()
                .find(|c| component_has_code(c, code))
                .and_then(|c| c.pointer("/valueQuantity/value"))
                .and_then(|v| v.as_f64())
        };

        Self {
            id: observation
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            effective: observation
                .get("effectiveDateTime")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            label,
            value: observation
                .pointer("/valueQuantity/value")
                .and_then(|v| v.as_f64()),
            unit: observation
                .pointer("/valueQuantity/unit")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            systolic: component_value(SYSTOLIC_CODE),
            diastolic: component_value(DIASTOLIC_CODE),
        }
    }

    /// Flags a blood pressure above 140 systolic or 90 diastolic; either
    /// side alone is enough when the other is missing.
    pub fn is_abnormal(&self) -> bool {
        is_abnormal_blood_pressure(
            self.systolic.unwrap_or(f64::NEG_INFINITY),
            self.diastolic.unwrap_or(f64::NEG_INFINITY),
        )
    }
}

fn component_has_code(component: &Value, code: &str) -> bool {
    component
        .pointer("/code/coding")
        .and_then(|c| c.as_array())
        .is_some_and(|codings| {
            codings
                .iter()
                .any(|coding| coding.get("code").and_then(|v| v.as_str()) == Some(code))
        })
}

/// Distinct labels in first-seen order, for filter menus
pub fn distinct_labels(readings: &[VitalReading]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in readings.iter().filter_map(|r| r.label.as_ref()) {
        if !labels.contains(label) {
            labels.push(label.clone());
        }
    }
    labels
}
