//! Version-agnostic FHIR models
//!
//! Types that work across FHIR R4, R4B, and R5

pub mod bundle;
pub mod complex;
pub mod error;
pub mod observation;
pub mod patient;

// Re-export commonly used types
pub use bundle::*;
pub use complex::*;
pub use error::{Error, Result};
pub use observation::*;
pub use patient::*;
