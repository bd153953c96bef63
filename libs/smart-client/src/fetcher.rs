//! Read-only resource fetchers with an explicit request state machine

use crate::error::Error;
use crate::fhir::{FhirClient, ResourceQuery};
use serde_json::Value;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    NotStarted,
    InFlight,
    Done(Vec<Value>),
    Failed(Error),
}

impl FetchState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, FetchState::InFlight)
    }
}

/// One query against the FHIR server.
///
/// [`fetch`](Self::fetch) issues the request only from `NotStarted`;
/// [`refetch`](Self::refetch) issues it from any settled state. Callers that
/// arrive while a request is in flight wait for that request instead of
/// starting another.
#[derive(Debug)]
pub struct ResourceFetcher {
    client: FhirClient,
    query: ResourceQuery,
    state: watch::Sender<FetchState>,
}

impl ResourceFetcher {
    pub fn new(client: FhirClient, query: ResourceQuery) -> Self {
        let (state, _) = watch::channel(FetchState::NotStarted);
        Self {
            client,
            query,
            state,
        }
    }

    pub fn query(&self) -> &ResourceQuery {
        &self.query
    }

    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().is_in_flight()
    }

    pub fn error(&self) -> Option<Error> {
        match &*self.state.borrow() {
            FetchState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<Vec<Value>> {
        match &*self.state.borrow() {
            FetchState::Done(resources) => Some(resources.clone()),
            _ => None,
        }
    }

    /// First load; a no-op once any attempt has been made.
    pub async fn fetch(&self) -> FetchState {
        self.run_or_join(false).await
    }

    /// Force a new request, clearing any previous error.
    pub async fn refetch(&self) -> FetchState {
        self.run_or_join(true).await
    }

    async fn run_or_join(&self, force: bool) -> FetchState {
        let started = self.state.send_if_modified(|state| {
            let start = match state {
                FetchState::NotStarted => true,
                FetchState::InFlight => false,
                FetchState::Done(_) | FetchState::Failed(_) => force,
            };
            if start {
                *state = FetchState::InFlight;
            }
            start
        });

        if started {
            self.run().await
        } else {
            self.settled().await
        }
    }

    async fn run(&self) -> FetchState {
        let mut guard = InFlightGuard {
            state: &self.state,
            armed: true,
        };

        let next = match self.client.search(&self.query).await {
            Ok(resources) => {
                tracing::debug!(
                    resource = self.query.resource_type(),
                    count = resources.len(),
                    "Fetched resources"
                );
                FetchState::Done(resources)
            }
            Err(e) => {
                tracing::error!(resource = self.query.resource_type(), error = %e, "Fetch failed");
                FetchState::Failed(e)
            }
        };

        guard.armed = false;
        self.state.send_replace(next.clone());
        next
    }

    async fn settled(&self) -> FetchState {
        let mut receiver = self.state.subscribe();
        let settled = receiver
            .wait_for(|state| !state.is_in_flight())
            .await
            .map(|state| (*state).clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }
}

/// Returns the fetcher to `NotStarted` if a request future is dropped mid-flight.
struct InFlightGuard<'a> {
    state: &'a watch::Sender<FetchState>,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(FetchState::NotStarted);
        }
    }
}
