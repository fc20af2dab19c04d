use std::future::pending;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::entities::Envelope;
use crate::entities::apartment::{Apartment, ApartmentResults};
use crate::error::AptSearchError;
use crate::sources::apartments::ApartmentSearchClient;

/// Anything that can answer an apartment search with the backend's envelope.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    async fn search_apartments(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Envelope<ApartmentResults>, AptSearchError>;

    /// Where requests go, shown in connection alerts.
    fn target(&self) -> String;
}

#[async_trait::async_trait]
impl SearchBackend for ApartmentSearchClient {
    async fn search_apartments(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Envelope<ApartmentResults>, AptSearchError> {
        self.apartments(query, limit).await
    }

    fn target(&self) -> String {
        self.base().to_string()
    }
}

/// Identifies one dispatch. Only the most recently minted token may touch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

#[derive(Debug, Default)]
pub(crate) struct TokenMint {
    latest: u64,
}

impl TokenMint {
    pub(crate) fn mint(&mut self) -> RequestToken {
        self.latest += 1;
        RequestToken(self.latest)
    }

    /// Makes every outstanding token stale without issuing a new one.
    pub(crate) fn invalidate(&mut self) {
        self.latest += 1;
    }

    pub(crate) fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Results(Vec<Apartment>),
    /// The server answered with `success: false`.
    Rejected,
    /// Transport, status or decoding failure, with its detail.
    Failed(String),
}

pub fn resolve(result: Result<Envelope<ApartmentResults>, AptSearchError>) -> Resolution {
    match result {
        Ok(envelope) if envelope.success => {
            Resolution::Results(envelope.data.map(|d| d.results).unwrap_or_default())
        }
        Ok(_) => Resolution::Rejected,
        Err(err) => Resolution::Failed(err.to_string()),
    }
}

#[derive(Debug)]
pub(crate) struct Completion {
    pub token: RequestToken,
    pub query: String,
    pub resolution: Resolution,
}

/// The request currently allowed to update state.
#[derive(Debug)]
pub(crate) struct InFlight {
    pub token: RequestToken,
    pub query: String,
    pub task: JoinHandle<()>,
}

impl InFlight {
    /// Outcome reported when the request task dies without sending a completion.
    pub(crate) fn crashed(self, err: &JoinError) -> Completion {
        Completion {
            token: self.token,
            query: self.query,
            resolution: Resolution::Failed(format!("search task failed: {err}")),
        }
    }
}

/// Runs one request off the controller task and reports back tagged with `token`.
pub(crate) fn spawn_request(
    backend: Arc<dyn SearchBackend>,
    token: RequestToken,
    query: String,
    limit: u32,
    completions: mpsc::UnboundedSender<Completion>,
) -> InFlight {
    let task_query = query.clone();
    let task = tokio::spawn(async move {
        let query = task_query;
        let resolution = resolve(backend.search_apartments(&query, limit).await);
        if completions
            .send(Completion {
                token,
                query,
                resolution,
            })
            .is_err()
        {
            debug!(?token, "search controller gone; dropping completion");
        }
    });
    InFlight { token, query, task }
}

/// Resolves when the in-flight request task exits. Pends forever when idle.
pub(crate) async fn joined(in_flight: &mut Option<InFlight>) -> Result<(), JoinError> {
    match in_flight {
        Some(request) => (&mut request.task).await,
        None => pending().await,
    }
}
