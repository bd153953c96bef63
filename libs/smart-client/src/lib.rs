//! SMART-on-FHIR client
//!
//! This crate performs the SMART EHR launch (discovery, CSRF state,
//! authorization redirect), handles the authorization callback and token
//! exchange, and gives the resulting session typed access to the patient's
//! chart: Patient, vital-sign Observations and AllergyIntolerances, plus
//! batch creation of new vitals.
//!
//! # Examples
//!
//! ## Launch
//!
//! ```rust,no_run
//! use bedside_smart::{ClientStorage, LaunchParams, SmartAppConfig, SmartClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SmartClient::new(SmartAppConfig::default(), ClientStorage::in_memory())?;
//! let params = LaunchParams::from_url(
//!     "http://localhost:3000/?iss=https://fhir.example.org/r4&launch=abc",
//! )?;
//! let redirect = client.launch(&params).await?;
//! println!("open {}", redirect.authorize_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Read vitals after the callback
//!
//! ```rust,no_run
//! use bedside_smart::{ClientStorage, ResourceQuery, SmartAppConfig, SmartClient};
//!
//! # async fn example(storage: ClientStorage) -> Result<(), Box<dyn std::error::Error>> {
//! let client = SmartClient::new(SmartAppConfig::default(), storage)?;
//! let session = client.session()?;
//! let vitals = client.fetcher(session, ResourceQuery::vital_signs());
//! vitals.fetch().await;
//! println!("{} observations", vitals.data().unwrap_or_default().len());
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod fhir;
pub mod launch;
pub mod observations;
pub mod session;
pub mod storage;

pub use callback::{CallbackHandler, CallbackState, CallbackSuccess};
pub use client::SmartClient;
pub use config::SmartAppConfig;
pub use discovery::SmartConfiguration;
pub use error::{Error, Result};
pub use fetcher::{FetchState, ResourceFetcher};
pub use fhir::{FhirClient, ResourceQuery};
pub use launch::{LaunchParams, LaunchRedirect};
pub use observations::{ObservationCreator, VitalEntry};
pub use session::SmartSession;
pub use storage::{keys, ClientStorage, FileStore, KeyValueStore, MemoryStore};
