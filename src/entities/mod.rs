//! Domain payloads exchanged with the apartment backend.

pub(crate) mod apartment;
pub(crate) mod location;
pub(crate) mod profile;
pub(crate) mod recent;

use serde::{Deserialize, Serialize};

/// Response envelope shared by the `/search/*` endpoints.
///
/// `data` is optional because failure envelopes (`success: false`) usually
/// omit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub meta: Option<SearchMeta>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            data: None,
            meta: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMeta {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub count: usize,
}

/// Error body emitted by the backend: `{"detail": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}
