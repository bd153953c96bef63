//! Bedside launch server
//!
//! A small axum app playing the SMART app's routes: `/launch` starts the EHR
//! launch, `/callback` completes the token exchange, the dashboard route
//! summarises the patient, and `/api/*` serves vitals and allergies and
//! accepts new vital-sign entries.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
