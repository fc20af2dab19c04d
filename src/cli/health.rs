use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::error::AptSearchError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub api: String,
    pub status: String,
    pub latency: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# aptsearch Health Check\n\n");
        out.push_str("| API | Status | Latency |\n");
        out.push_str("|-----|--------|---------|\n");
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.api, row.status, row.latency
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} endpoints healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

/// Body of `GET /health`.
#[derive(Debug, Deserialize)]
struct ServerHealth {
    #[serde(default)]
    status: String,
    #[serde(default)]
    service: Option<String>,
}

async fn check_one(client: reqwest::Client, api: &str, url: &str) -> HealthRow {
    let start = Instant::now();
    let resp = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await;

    match resp {
        Ok(resp) => {
            let status = resp.status();
            let elapsed = start.elapsed().as_millis();
            if status.is_success() {
                HealthRow {
                    api: api.to_string(),
                    status: "ok".into(),
                    latency: format!("{elapsed}ms"),
                }
            } else {
                HealthRow {
                    api: api.to_string(),
                    status: "error".into(),
                    latency: format!("{elapsed}ms (HTTP {})", status.as_u16()),
                }
            }
        }
        Err(err) => failed_row(api, &err),
    }
}

/// Like [`check_one`], but the server must also report itself `healthy`.
async fn check_server(client: reqwest::Client, base: &str) -> HealthRow {
    let api = "Server";
    let url = crate::sources::join_endpoint(base, "health");
    let start = Instant::now();
    let resp = match client.get(&url).send().await {
        Ok(resp) => resp,
        Err(err) => return failed_row(api, &err),
    };
    let status = resp.status();
    let elapsed = start.elapsed().as_millis();
    if !status.is_success() {
        return HealthRow {
            api: api.to_string(),
            status: "error".into(),
            latency: format!("{elapsed}ms (HTTP {})", status.as_u16()),
        };
    }

    match resp.json::<ServerHealth>().await {
        Ok(body) if body.status.eq_ignore_ascii_case("healthy") => HealthRow {
            api: match body.service.as_deref().map(str::trim) {
                Some(service) if !service.is_empty() => format!("{api} ({service})"),
                _ => api.to_string(),
            },
            status: "ok".into(),
            latency: format!("{elapsed}ms"),
        },
        Ok(body) => HealthRow {
            api: api.to_string(),
            status: "error".into(),
            latency: format!("{elapsed}ms (status: {})", body.status),
        },
        Err(_) => HealthRow {
            api: api.to_string(),
            status: "error".into(),
            latency: format!("{elapsed}ms (invalid body)"),
        },
    }
}

fn failed_row(api: &str, err: &reqwest::Error) -> HealthRow {
    let reason = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "error"
    };
    HealthRow {
        api: api.to_string(),
        status: "error".into(),
        latency: reason.into(),
    }
}

fn health_http_client() -> Result<reqwest::Client, AptSearchError> {
    static HEALTH_HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HEALTH_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("aptsearch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(AptSearchError::HttpClientInit)?;

    match HEALTH_HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HEALTH_HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| AptSearchError::Api {
                api: "health".into(),
                message: "Health HTTP client initialization race".into(),
            }),
    }
}

/// Probes the server health endpoint and both public search endpoints.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be created.
pub async fn check(server_base: &str, search_base: &str) -> Result<HealthReport, AptSearchError> {
    let client = health_http_client()?;

    let apartments_url = format!(
        "{}?q=%EC%84%9C%EC%9A%B8&limit=1",
        crate::sources::join_endpoint(search_base, "apartments")
    );
    let locations_url = format!(
        "{}?q=%EC%84%9C%EC%9A%B8",
        crate::sources::join_endpoint(search_base, "locations")
    );

    let (server, apartments, locations) = tokio::join!(
        check_server(client.clone(), server_base),
        check_one(client.clone(), "Apartment search", &apartments_url),
        check_one(client.clone(), "Location search", &locations_url),
    );

    let rows = vec![server, apartments, locations];
    let healthy = rows.iter().filter(|r| r.status == "ok").count();
    Ok(HealthReport {
        healthy,
        total: rows.len(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn reports_each_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "healthy",
                "service": "apartment-api"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search/apartments"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"results": []}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search/locations"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let search_base = format!("{}/api/v1/search", server.uri());
        let report = check(&server.uri(), &search_base).await.expect("report");

        assert_eq!(report.total, 3);
        assert_eq!(report.healthy, 2);
        assert!(!report.all_healthy());
        assert_eq!(report.rows[0].api, "Server (apartment-api)");
        assert!(report.rows[2].latency.contains("HTTP 503"));

        let markdown = report.to_markdown();
        assert!(markdown.contains("| Apartment search | ok |"));
        assert!(markdown.contains("Status: 2/3 endpoints healthy"));
    }

    #[tokio::test]
    async fn unhealthy_status_body_counts_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "degraded"})),
            )
            .mount(&server)
            .await;

        let client = health_http_client().expect("client");
        let row = check_server(client, &server.uri()).await;
        assert_eq!(row.status, "error");
        assert!(row.latency.contains("degraded"));
    }
}
