use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::entities::apartment::Apartment;
use crate::error::AptSearchError;
use crate::search::executor::Resolution;

pub(crate) const SEARCH_FAILED_MESSAGE: &str = "Search failed.";

/// Result-count choices offered by the search screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "u32")]
pub enum ResultLimit {
    #[default]
    Ten,
    Twenty,
    Thirty,
    Fifty,
}

impl ResultLimit {
    pub const ALL: [ResultLimit; 4] = [Self::Ten, Self::Twenty, Self::Thirty, Self::Fifty];

    pub fn get(self) -> u32 {
        match self {
            Self::Ten => 10,
            Self::Twenty => 20,
            Self::Thirty => 30,
            Self::Fifty => 50,
        }
    }
}

impl From<ResultLimit> for u32 {
    fn from(value: ResultLimit) -> Self {
        value.get()
    }
}

impl TryFrom<u32> for ResultLimit {
    type Error = AptSearchError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|limit| limit.get() == value)
            .ok_or_else(|| {
                AptSearchError::InvalidArgument(format!(
                    "--limit must be one of 10, 20, 30, 50 (got {value})"
                ))
            })
    }
}

impl FromStr for ResultLimit {
    type Err = AptSearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s.trim().parse().map_err(|_| {
            AptSearchError::InvalidArgument(format!("--limit must be a number (got '{s}')"))
        })?;
        Self::try_from(value)
    }
}

impl fmt::Display for ResultLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Snapshot of the search control as observers see it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Apartment>,
    pub loading: bool,
    pub error: Option<String>,
    pub limit: ResultLimit,
}

impl SearchState {
    pub(crate) fn with_limit(limit: ResultLimit) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub(crate) fn begin_request(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Query dropped below the minimum: nothing is pending any more.
    pub(crate) fn reset(&mut self) {
        self.results.clear();
        self.error = None;
        self.loading = false;
    }

    pub(crate) fn apply(&mut self, resolution: Resolution) {
        self.loading = false;
        match resolution {
            Resolution::Results(results) => {
                self.results = results;
                self.error = None;
            }
            Resolution::Rejected => {
                self.results.clear();
                self.error = Some(SEARCH_FAILED_MESSAGE.to_string());
            }
            Resolution::Failed(detail) => {
                self.results.clear();
                self.error = Some(connection_error_message(&detail));
            }
        }
    }
}

pub(crate) fn connection_error_message(detail: &str) -> String {
    format!("Connection error: {detail}")
}
