//! FHIR data models for the Bedside SMART client
//!
//! This crate provides the strongly-typed Rust structures the client needs
//! to talk to a FHIR server: search Bundles, vital-sign Observations and the
//! handful of datatypes they are made of.
//!
//! # Module Organization
//!
//! - `common`: Version-agnostic models (Bundle, Observation, datatypes, Patient summary)
//! - `vitals`: Fixed LOINC/UCUM templates for the recognized vital signs
//!
//! # Design Philosophy
//!
//! - **Opaque where possible**: Resources fetched from the server stay `serde_json::Value`
//! - **Typed where we author**: Observations constructed by the client are typed values
//! - **Immutable output**: Builders and factory functions return finished values
//!
//! # Example
//!
//! ```rust
//! use bedside_models::vitals;
//! use chrono::Utc;
//!
//! let observation = vitals::bmi("example", 22.5, Utc::now());
//! assert_eq!(observation.code.coding[0].code.as_deref(), Some("39156-5"));
//!
//! let json = serde_json::to_value(&observation).unwrap();
//! assert_eq!(json["valueQuantity"]["unit"], "kg/m2");
//! ```

pub mod common;
pub mod vitals;

// Re-export commonly used types
pub use common::*;
