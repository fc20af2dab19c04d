use std::borrow::Cow;

use crate::entities::Envelope;
use crate::entities::apartment::ApartmentResults;
use crate::entities::location::{Location, LocationResults, LocationType};
use crate::entities::recent::{DeleteAck, RECENT_LIMIT_MAX, RecentSearch, RecentSearches};
use crate::error::AptSearchError;
use crate::sources::auth::Session;

const SEARCH_BASE: &str = "http://localhost:8000/api/v1/search";
const SEARCH_API: &str = "search";
const SEARCH_BASE_ENV: &str = "APTSEARCH_SEARCH_BASE";
const APARTMENT_LIMIT_MAX: u32 = 50;

/// Client for the `/search` endpoints of the apartment backend.
#[derive(Clone)]
pub struct ApartmentSearchClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

impl ApartmentSearchClient {
    /// Builds a client against `APTSEARCH_SEARCH_BASE` (or the local default).
    pub fn new() -> Result<Self, AptSearchError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(SEARCH_BASE, SEARCH_BASE_ENV),
        })
    }

    pub fn with_base(base: impl Into<String>) -> Result<Self, AptSearchError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base.into()),
        })
    }

    pub fn base(&self) -> &str {
        self.base.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        crate::sources::join_endpoint(self.base.as_ref(), path)
    }

    /// `GET /apartments?q=…&limit=…`.
    ///
    /// The raw envelope is returned so callers can tell an application-level
    /// rejection (`success: false`) apart from a transport failure.
    pub async fn apartments(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Envelope<ApartmentResults>, AptSearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AptSearchError::InvalidArgument(
                "Search query is required".into(),
            ));
        }
        if !(1..=APARTMENT_LIMIT_MAX).contains(&limit) {
            return Err(AptSearchError::InvalidArgument(format!(
                "--limit must be between 1 and {APARTMENT_LIMIT_MAX}"
            )));
        }

        let url = self.endpoint("apartments");
        let limit = limit.to_string();
        crate::sources::send_json(
            SEARCH_API,
            self.client
                .get(&url)
                .query(&[("q", query), ("limit", limit.as_str())]),
        )
        .await
    }

    /// `GET /locations?q=…[&location_type=…]`.
    pub async fn locations(
        &self,
        query: &str,
        location_type: Option<LocationType>,
    ) -> Result<Vec<Location>, AptSearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AptSearchError::InvalidArgument(
                "Location query is required".into(),
            ));
        }

        let url = self.endpoint("locations");
        let mut params = vec![("q", query)];
        if let Some(kind) = location_type {
            params.push(("location_type", kind.as_str()));
        }
        let resp: Envelope<LocationResults> =
            crate::sources::send_json(SEARCH_API, self.client.get(&url).query(&params)).await?;
        Ok(unwrap_envelope(resp, "location search")?.results)
    }

    /// `GET /recent?limit=…` for the signed-in account.
    pub async fn recent(
        &self,
        session: Option<&Session>,
        limit: u32,
    ) -> Result<Vec<RecentSearch>, AptSearchError> {
        let session = session.ok_or_else(|| AptSearchError::auth_required("recent searches"))?;
        if !(1..=RECENT_LIMIT_MAX).contains(&limit) {
            return Err(AptSearchError::InvalidArgument(format!(
                "--limit must be between 1 and {RECENT_LIMIT_MAX}"
            )));
        }

        let url = self.endpoint("recent");
        let limit = limit.to_string();
        let req = session.authorize(self.client.get(&url).query(&[("limit", limit.as_str())]));
        let resp: Envelope<RecentSearches> = crate::sources::send_json(SEARCH_API, req).await?;
        Ok(unwrap_envelope(resp, "recent searches")?.recent_searches)
    }

    /// `DELETE /recent/{id}`; returns the server's confirmation message.
    pub async fn delete_recent(
        &self,
        session: Option<&Session>,
        id: &str,
    ) -> Result<String, AptSearchError> {
        let session = session.ok_or_else(|| AptSearchError::auth_required("recent search delete"))?;
        let id = id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(AptSearchError::InvalidArgument(format!(
                "Recent search id must be numeric (got '{id}')"
            )));
        }

        let url = self.endpoint(&format!("recent/{id}"));
        let resp: Envelope<DeleteAck> =
            crate::sources::send_json(SEARCH_API, session.authorize(self.client.delete(&url)))
                .await?;
        Ok(unwrap_envelope(resp, "recent search delete")?.message)
    }
}

fn unwrap_envelope<T: Default>(resp: Envelope<T>, what: &str) -> Result<T, AptSearchError> {
    if !resp.success {
        return Err(AptSearchError::Api {
            api: SEARCH_API.to_string(),
            message: format!("{what} reported failure"),
        });
    }
    Ok(resp.data.unwrap_or_default())
}
