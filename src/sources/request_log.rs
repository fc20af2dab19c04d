use std::time::Instant;

use http::Extensions;
use reqwest::Url;
use reqwest_middleware::{Middleware, Next};
use tracing::debug;

/// Logs method, URL, status and latency for every outbound request.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RequestLogMiddleware;

fn loggable_url(url: &Url) -> String {
    let mut out = url.clone();
    let _ = out.set_password(None);
    let _ = out.set_username("");
    out.to_string()
}

#[async_trait::async_trait]
impl Middleware for RequestLogMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        let method = req.method().clone();
        let url = loggable_url(req.url());
        let start = Instant::now();

        let result = next.run(req, extensions).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(resp) => debug!(
                %method,
                url = %url,
                status = resp.status().as_u16(),
                elapsed_ms,
                "http request completed"
            ),
            Err(err) => debug!(
                %method,
                url = %url,
                elapsed_ms,
                error = %err,
                "http request failed"
            ),
        }
        result
    }
}
