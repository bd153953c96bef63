//! Entry point tying configuration, storage and HTTP together

use crate::callback::CallbackHandler;
use crate::config::SmartAppConfig;
use crate::error::Result;
use crate::fetcher::ResourceFetcher;
use crate::fhir::{FhirClient, ResourceQuery};
use crate::launch::{self, LaunchParams, LaunchRedirect};
use crate::observations::ObservationCreator;
use crate::session::SmartSession;
use crate::storage::ClientStorage;
use reqwest::Client;

/// A SMART app instance: one registration, one pair of stores.
#[derive(Debug, Clone)]
pub struct SmartClient {
    http: Client,
    config: SmartAppConfig,
    storage: ClientStorage,
}

impl SmartClient {
    pub fn new(config: SmartAppConfig, storage: ClientStorage) -> Result<Self> {
        let http = config.http_client()?;
        Ok(Self::with_http_client(http, config, storage))
    }

    pub fn with_http_client(http: Client, config: SmartAppConfig, storage: ClientStorage) -> Self {
        Self {
            http,
            config,
            storage,
        }
    }

    /// Same registration and HTTP client over another pair of stores
    pub fn with_storage(&self, storage: ClientStorage) -> Self {
        Self::with_http_client(self.http.clone(), self.config.clone(), storage)
    }

    pub fn config(&self) -> &SmartAppConfig {
        &self.config
    }

    pub fn storage(&self) -> &ClientStorage {
        &self.storage
    }

    pub async fn launch(&self, params: &LaunchParams) -> Result<LaunchRedirect> {
        launch::launch(&self.http, &self.config, &self.storage, params).await
    }

    /// A fresh handler for one callback request
    pub fn callback_handler(&self) -> CallbackHandler {
        CallbackHandler::new(self.http.clone(), self.config.clone(), self.storage.clone())
    }

    /// Session built from the durable store
    pub fn session(&self) -> Result<SmartSession> {
        SmartSession::from_store(self.storage.durable.as_ref())
    }

    pub fn fhir(&self, session: SmartSession) -> FhirClient {
        FhirClient::new(self.http.clone(), session)
    }

    pub fn fetcher(&self, session: SmartSession, query: ResourceQuery) -> ResourceFetcher {
        ResourceFetcher::new(self.fhir(session), query)
    }

    pub fn observation_creator(&self, session: SmartSession) -> ObservationCreator {
        ObservationCreator::new(self.fhir(session))
    }
}
