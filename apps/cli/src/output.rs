//! Terminal rendering

use anyhow::Result;
use bedside_models::vitals::{self, VitalKind, VitalReading, DIASTOLIC_RANGE, SYSTOLIC_RANGE};
use bedside_models::PatientSummary;
use serde_json::Value;

pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_patient(summary: &PatientSummary) {
    println!("{}", summary.display_name);
    let field = |label: &str, value: Option<String>| {
        println!("  {:<12} {}", label, value.unwrap_or_else(|| "-".to_string()));
    };
    field("ID", summary.id.clone());
    field("MRN", summary.mrn.clone());
    field("Gender", summary.gender.clone());
    field(
        "Birth date",
        summary
            .birth_date
            .map(|d| match summary.age {
                Some(age) => format!("{d} ({age} years)"),
                None => d.to_string(),
            }),
    );
    if !summary.other_names.is_empty() {
        field("Also known", Some(summary.other_names.join(", ")));
    }
    if !summary.phones.is_empty() {
        field("Phone", Some(summary.phones.join(", ")));
    }
    if !summary.emails.is_empty() {
        field("Email", Some(summary.emails.join(", ")));
    }
    for contact in &summary.emergency_contacts {
        field(
            "Emergency",
            Some(format!("{} {}", contact.name, contact.phones.join(", "))),
        );
    }
}

pub fn print_vitals(observations: &[Value], label: Option<&str>) {
    let readings: Vec<VitalReading> = observations
        .iter()
        .map(VitalReading::from_observation)
        .collect();
    if readings.is_empty() {
        println!("No vital signs recorded.");
        return;
    }

    println!("{:<26} {:<32} {:>14}", "Date", "Vital", "Value");
    for reading in readings
        .iter()
        .filter(|r| label.map_or(true, |l| r.label.as_deref() == Some(l)))
    {
        let value = match (reading.systolic, reading.diastolic, reading.value) {
            (Some(s), Some(d), _) => format!("{s}/{d} mmHg"),
            (_, _, Some(v)) => format!("{} {}", v, reading.unit.as_deref().unwrap_or("")),
            _ => "-".to_string(),
        };
        let flag = if reading.is_abnormal() { " !" } else { "" };
        println!(
            "{:<26} {:<32} {:>14}{}",
            reading.effective.as_deref().unwrap_or("-"),
            reading.label.as_deref().unwrap_or("-"),
            value.trim_end(),
            flag
        );
    }

    let labels = vitals::distinct_labels(&readings);
    println!();
    println!("Labels: {}", labels.join(", "));
}

pub fn print_allergies(allergies: &[Value]) {
    if allergies.is_empty() {
        println!("No known allergies.");
        return;
    }
    for allergy in allergies {
        let substance = allergy
            .pointer("/code/text")
            .or_else(|| allergy.pointer("/code/coding/0/display"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown substance");
        let criticality = allergy
            .get("criticality")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        println!("{substance} (criticality: {criticality})");
    }
}

pub fn print_catalogue() {
    println!("{:<18} {:<24} {:<10} {}", "Code", "Vital", "LOINC", "Normal range");
    for kind in VitalKind::ALL {
        let range = match kind.normal_range() {
            Some(r) => format!("{} - {} {}", r.min, r.max, r.unit),
            None => format!(
                "{}-{}/{}-{} {}",
                SYSTOLIC_RANGE.min,
                SYSTOLIC_RANGE.max,
                DIASTOLIC_RANGE.min,
                DIASTOLIC_RANGE.max,
                SYSTOLIC_RANGE.unit
            ),
        };
        println!(
            "{:<18} {:<24} {:<10} {}",
            kind.code(),
            kind.display_name(),
            kind.loinc_code(),
            range
        );
    }
}
