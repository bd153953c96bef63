//! Patient summary helpers
//!
//! Patients are read-only in this client and are kept as JSON. `PatientSummary`
//! extracts the demographics a chart header needs.

use super::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::Value;

/// Relationship display that marks a contact as an emergency contact
const FAMILY_MEMBER: &str = "Family Member";

/// Identifier type code for medical record numbers
const MRN_TYPE_CODE: &str = "MR";

/// Demographics extracted from a Patient resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: Option<String>,
    pub display_name: String,
    pub initials: String,
    /// Additional names beyond the first, formatted "Given Family"
    pub other_names: Vec<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<u32>,
    pub mrn: Option<String>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub emergency_contacts: Vec<EmergencyContact>,
    /// `generalPractitioner` references (e.g. "Practitioner/123")
    pub general_practitioners: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phones: Vec<String>,
}

impl PatientSummary {
    /// Summarize a Patient resource; `today` anchors the age calculation.
    pub fn from_resource(patient: &Value, today: NaiveDate) -> Result<Self> {
        match patient.get("resourceType").and_then(|v| v.as_str()) {
            Some("Patient") => {}
            Some(other) => {
                return Err(Error::UnexpectedResourceType {
                    expected: "Patient".to_string(),
                    actual: other.to_string(),
                })
            }
            None => return Err(Error::MissingField("resourceType".to_string())),
        }

        let names = array(patient, "name");
        let primary = names.first();
        let display_name = primary.map(format_name).unwrap_or_default();
        let initials = primary.map(initials).unwrap_or_default();
        let other_names = names.iter().skip(1).map(format_name).collect();

        let birth_date = patient
            .get("birthDate")
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        let emergency_contacts = array(patient, "contact")
            .iter()
            .filter(|c| first_relationship_display(c) == Some(FAMILY_MEMBER))
            .map(|c| EmergencyContact {
                name: c.get("name").map(format_name).unwrap_or_default(),
                phones: telecom(c, "phone"),
            })
            .collect();

        let general_practitioners = array(patient, "generalPractitioner")
            .iter()
            .filter_map(|r| r.get("reference").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect();

        Ok(Self {
            id: str_field(patient, "id"),
            display_name,
            initials,
            other_names,
            gender: str_field(patient, "gender"),
            birth_date,
            age: birth_date.and_then(|b| age_on(b, today)),
            mrn: medical_record_number(patient),
            phones: telecom(patient, "phone"),
            emails: telecom(patient, "email"),
            emergency_contacts,
            general_practitioners,
        })
    }
}

/// Whole years between `birth_date` and `today`; `None` for future birth dates.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// Value of the identifier typed `MR`
pub fn medical_record_number(patient: &Value) -> Option<String> {
    array(patient, "identifier")
        .iter()
        .find(|id| {
            id.pointer("/type/coding/0/code").and_then(|v| v.as_str()) == Some(MRN_TYPE_CODE)
        })
        .and_then(|id| str_field(id, "value"))
}

fn array<'a>(value: &'a Value, field: &str) -> &'a [Value] {
    value
        .get(field)
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(|v| v.as_str()).map(str::to_string)
}

fn given_names(name: &Value) -> Vec<&str> {
    array(name, "given").iter().filter_map(|g| g.as_str()).collect()
}

fn format_name(name: &Value) -> String {
    let mut parts = given_names(name);
    if let Some(family) = name.get("family").and_then(|v| v.as_str()) {
        parts.push(family);
    }
    if parts.is_empty() {
        return name
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
    }
    parts.join(" ")
}

fn initials(name: &Value) -> String {
    let given = given_names(name).first().and_then(|g| g.chars().next());
    let family = name
        .get("family")
        .and_then(|v| v.as_str())
        .and_then(|f| f.chars().next());
    given.into_iter().chain(family).collect()
}

fn telecom(value: &Value, system: &str) -> Vec<String> {
    array(value, "telecom")
        .iter()
        .filter(|t| t.get("system").and_then(|v| v.as_str()) == Some(system))
        .filter_map(|t| str_field(t, "value"))
        .collect()
}

fn first_relationship_display(contact: &Value) -> Option<&str> {
    contact
        .pointer("/relationship/0/coding/0/display")
        .and_then(|v| v.as_str())
}
