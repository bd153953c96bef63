//! FHIR complex datatypes
//!
//! The subset of general-purpose datatypes used by vital-sign Observations.

use serde::{Deserialize, Serialize};

/// Canonical URL of the UCUM code system
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

/// Canonical URL of the LOINC code system
pub const LOINC_SYSTEM: &str = "http://loinc.org";

/// Canonical URL of SNOMED CT
pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";

/// A reference to a code defined by a terminology system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    /// Identity of the terminology system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Symbol in syntax defined by the system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Representation defined by the system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// LOINC coding with a display string
    pub fn loinc(code: &str, display: &str) -> Self {
        Self::new(LOINC_SYSTEM, code).with_display(display)
    }
}

/// Concept - reference to a terminology or just text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeableConcept {
    /// Code defined by a terminology system
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    /// Plain text representation of the concept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// Concept from codings; text falls back to the first coding's display.
    pub fn from_codings(coding: Vec<Coding>, text: Option<String>) -> Self {
        let text = text.or_else(|| coding.first().and_then(|c| c.display.clone()));
        Self { coding, text }
    }

    /// Single coding whose display doubles as the concept text.
    pub fn from_coding(coding: Coding) -> Self {
        Self::from_codings(vec![coding], None)
    }

    /// Whether any coding carries `code`
    pub fn has_code(&self, code: &str) -> bool {
        self.coding.iter().any(|c| c.code.as_deref() == Some(code))
    }
}

/// A measured amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quantity {
    pub value: f64,

    /// Unit representation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// System that defines coded unit form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Coded form of the unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Quantity {
    /// UCUM quantity with a human unit and its coded form
    pub fn ucum(value: f64, unit: &str, code: &str) -> Self {
        Self {
            value,
            unit: Some(unit.to_string()),
            system: Some(UCUM_SYSTEM.to_string()),
            code: Some(code.to_string()),
        }
    }
}

/// A reference from one resource to another
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Literal reference, relative, internal or absolute URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Text alternative for the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn patient(patient_id: &str) -> Self {
        Self {
            reference: Some(format!("Patient/{}", patient_id)),
            display: None,
        }
    }
}

/// An identifier intended for computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}
