use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;

use crate::entities::profile::{Profile, ProfileUpdate};
use crate::error::AptSearchError;

const AUTH_BASE: &str = "http://localhost:8000/api/v1/auth";
const AUTH_API: &str = "auth";
const AUTH_BASE_ENV: &str = "APTSEARCH_AUTH_BASE";

/// Signed-in session. Passed explicitly to every call that needs one.
#[derive(Clone)]
pub struct Session {
    token: String,
}

impl Session {
    /// Returns `None` for a blank token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return None;
        }
        Some(Self { token })
    }

    pub fn from_env() -> Option<Self> {
        std::env::var(crate::sources::TOKEN_ENV)
            .ok()
            .and_then(Self::new)
    }

    pub(crate) fn authorize(
        &self,
        req: reqwest_middleware::RequestBuilder,
    ) -> reqwest_middleware::RequestBuilder {
        req.bearer_auth(&self.token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Client for `GET/PATCH /auth/me`.
pub struct ProfileClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

impl ProfileClient {
    pub fn new() -> Result<Self, AptSearchError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(AUTH_BASE, AUTH_BASE_ENV),
        })
    }

    pub fn with_base(base: impl Into<String>) -> Result<Self, AptSearchError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base.into()),
        })
    }

    fn me_url(&self) -> String {
        crate::sources::join_endpoint(self.base.as_ref(), "me")
    }

    /// Fetches the signed-in profile. Without a session there is no profile,
    /// which is not an error.
    pub async fn fetch(
        &self,
        session: Option<&Session>,
    ) -> Result<Option<Profile>, AptSearchError> {
        let Some(session) = session else {
            return Ok(None);
        };

        let resp: DataEnvelope<Profile> =
            crate::sources::send_json(AUTH_API, session.authorize(self.client.get(self.me_url())))
                .await?;
        Ok(Some(resp.data))
    }

    pub async fn update(
        &self,
        session: Option<&Session>,
        update: &ProfileUpdate,
    ) -> Result<Profile, AptSearchError> {
        let session = session.ok_or_else(|| AptSearchError::auth_required("profile update"))?;
        let body = update.normalized()?;

        let req = session.authorize(self.client.patch(self.me_url()).json(&body));
        let resp: DataEnvelope<Profile> = crate::sources::send_json(AUTH_API, req).await?;
        Ok(resp.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn profile_json(nickname: &str) -> serde_json::Value {
        serde_json::json!({
            "account_id": 1,
            "clerk_user_id": "user_2abc123def456",
            "email": "user@example.com",
            "nickname": nickname,
            "profile_image_url": null,
            "last_login_at": "2026-01-11T12:00:00Z",
            "created_at": "2026-01-01T00:00:00Z"
        })
    }

    #[test]
    fn session_rejects_blank_token_and_redacts_debug() {
        assert!(Session::new("   ").is_none());
        let session = Session::new("secret-token").unwrap();
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn fetch_without_session_is_none() {
        let client = ProfileClient::with_base("http://127.0.0.1:9").unwrap();
        assert!(client.fetch(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_reads_profile_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": profile_json("홍길동")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ProfileClient::with_base(server.uri()).unwrap();
        let session = Session::new("tok").unwrap();
        let profile = client.fetch(Some(&session)).await.unwrap().unwrap();
        assert_eq!(profile.nickname, "홍길동");
        assert_eq!(profile.account_id, 1);
    }

    #[tokio::test]
    async fn fetch_surfaces_detail_message_on_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "detail": {"code": "TOKEN_EXPIRED", "message": "Session expired. Sign in again."}
            })))
            .mount(&server)
            .await;

        let client = ProfileClient::with_base(server.uri()).unwrap();
        let session = Session::new("stale").unwrap();
        let err = client.fetch(Some(&session)).await.unwrap_err();
        assert!(err.to_string().contains("Session expired. Sign in again."));
    }

    #[tokio::test]
    async fn update_requires_session() {
        let client = ProfileClient::with_base("http://127.0.0.1:9").unwrap();
        let update = ProfileUpdate {
            nickname: Some("홍길동".into()),
            ..Default::default()
        };
        let err = client.update(None, &update).await.unwrap_err();
        assert!(matches!(err, AptSearchError::AuthRequired { .. }));
    }

    #[tokio::test]
    async fn update_patches_only_given_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/me"))
            .and(body_json(serde_json::json!({"nickname": "새이름"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": profile_json("새이름")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ProfileClient::with_base(server.uri()).unwrap();
        let session = Session::new("tok").unwrap();
        let update = ProfileUpdate {
            nickname: Some(" 새이름 ".into()),
            ..Default::default()
        };
        let profile = client.update(Some(&session), &update).await.unwrap();
        assert_eq!(profile.nickname, "새이름");
    }
}
