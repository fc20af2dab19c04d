//! HTTP clients for the apartment backend and the shared request plumbing they use.

use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::entities::ErrorBody;
use crate::error::AptSearchError;

pub(crate) mod apartments;
pub(crate) mod auth;
pub(crate) mod request_log;

const ERROR_BODY_MAX_BYTES: usize = 2048;
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub(crate) const TOKEN_ENV: &str = "APTSEARCH_TOKEN";
pub(crate) const SERVER_BASE: &str = "http://localhost:8000";
pub(crate) const SERVER_BASE_ENV: &str = "APTSEARCH_SERVER_BASE";

static HTTP_CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();

pub(crate) fn env_base(default: &'static str, env_var: &str) -> Cow<'static, str> {
    std::env::var(env_var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(Cow::Owned)
        .unwrap_or_else(|| Cow::Borrowed(default))
}

pub(crate) fn join_endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Returns the shared HTTP client.
///
/// Only request logging is layered on top of reqwest. Search requests are
/// terminal on failure, so no retry or cache middleware is installed.
pub(crate) fn shared_client() -> Result<ClientWithMiddleware, AptSearchError> {
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let base_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("aptsearch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(AptSearchError::HttpClientInit)?;

    let client = ClientBuilder::new(base_client)
        .with(request_log::RequestLogMiddleware)
        .build();

    match HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HTTP_CLIENT.get().cloned().ok_or_else(|| AptSearchError::Api {
            api: "http-client".into(),
            message: "Shared HTTP client initialization race".into(),
        }),
    }
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let full = String::from_utf8_lossy(bytes);

    let truncated: &str = if full.len() > ERROR_BODY_MAX_BYTES {
        let mut end = ERROR_BODY_MAX_BYTES;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        &full[..end]
    } else {
        full.as_ref()
    };

    let mut s = truncated.trim().replace(['\n', '\r', '\t'], " ");
    if full.len() > ERROR_BODY_MAX_BYTES {
        s.push_str(" …");
    }
    s
}

/// Builds the error for a non-2xx response.
///
/// Prefers the backend's `detail.message` when the body carries one.
pub(crate) fn status_error(api: &str, status: StatusCode, body: &[u8]) -> AptSearchError {
    let message = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => match parsed.detail.code {
            Some(code) => format!("HTTP {status}: {} ({code})", parsed.detail.message),
            None => format!("HTTP {status}: {}", parsed.detail.message),
        },
        Err(_) => format!("HTTP {status}: {}", body_excerpt(body)),
    };
    AptSearchError::Api {
        api: api.to_string(),
        message,
    }
}

pub(crate) fn ensure_json_content_type(
    api: &str,
    content_type: Option<&HeaderValue>,
    body: &[u8],
) -> Result<(), AptSearchError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    let raw = match content_type.to_str() {
        Ok(v) => v.trim(),
        Err(_) => {
            warn!(
                source = api,
                "Response content-type header was not valid UTF-8; attempting JSON parse"
            );
            return Ok(());
        }
    };
    if raw.is_empty() {
        return Ok(());
    }

    let media_type = raw
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_html = matches!(media_type.as_str(), "text/html" | "application/xhtml+xml");
    if is_html {
        return Err(AptSearchError::Api {
            api: api.to_string(),
            message: format!(
                "Unexpected HTML response (content-type: {raw}): {}",
                body_excerpt(body)
            ),
        });
    }

    let is_json = media_type == "application/json"
        || media_type == "text/json"
        || media_type.ends_with("+json");
    if !is_json {
        warn!(
            source = api,
            content_type = raw,
            "Unexpected non-JSON content type; attempting JSON parse for compatibility"
        );
    }

    Ok(())
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, AptSearchError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp.chunk().await? {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(AptSearchError::Api {
                api: api.to_string(),
                message: format!("Response body exceeded {DEFAULT_MAX_BODY_BYTES} bytes"),
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Sends `req` and decodes a JSON body, mapping non-2xx statuses to [`AptSearchError::Api`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    api: &str,
    req: reqwest_middleware::RequestBuilder,
) -> Result<T, AptSearchError> {
    let resp = req.send().await?;
    let status = resp.status();
    let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
    let bytes = read_limited_body(resp, api).await?;
    if !status.is_success() {
        return Err(status_error(api, status, &bytes));
    }
    ensure_json_content_type(api, content_type.as_ref(), &bytes)?;
    serde_json::from_slice(&bytes).map_err(|source| AptSearchError::ApiJson {
        api: api.to_string(),
        source,
    })
}
