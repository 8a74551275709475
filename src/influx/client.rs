//! InfluxDB v2 HTTP client
//!
//! Write and query calls against `/api/v2/write` and `/api/v2/query`. No
//! retries: a failed call is reported to the gateway caller as is.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::InfluxConfig;
use crate::influx::error::{InfluxError, InfluxResult};

const LINE_PROTOCOL: &str = "text/plain; charset=utf-8";
const FLUX: &str = "application/vnd.flux";

/// Health of an upstream service as reported by the status endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub ok: bool,
    /// Health body returned by the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    /// Non-success HTTP status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Transport error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The database operations the gateway needs
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Write a newline-delimited line protocol body with second precision
    async fn write_lines(&self, body: String) -> InfluxResult<()>;

    /// Run a Flux script and return annotated CSV
    async fn query_csv(&self, flux: &str) -> InfluxResult<String>;

    /// Run a Flux script asking for JSON and return the body untouched
    async fn query_raw(&self, flux: &str) -> InfluxResult<String>;

    /// Probe the database health endpoint
    async fn health(&self) -> ServiceStatus;
}

/// reqwest-backed [`TimeSeriesStore`]
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: Client,
    host: String,
    org: String,
    bucket: String,
    token: Option<String>,
    status_timeout: Duration,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig) -> InfluxResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| InfluxError::Config(e.to_string()))?;

        Ok(Self {
            http,
            host: config.host.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: Some(config.token.clone()).filter(|t| !t.is_empty()),
            status_timeout: Duration::from_secs(config.status_timeout_secs),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Token {}", token)),
            None => request,
        }
    }

    async fn query(&self, flux: &str, accept: &str) -> InfluxResult<String> {
        let url = format!("{}/api/v2/query", self.host);
        tracing::debug!(flux = %flux, "running query");

        let request = self
            .http
            .post(&url)
            .query(&[("org", self.org.as_str())])
            .header(header::CONTENT_TYPE, FLUX)
            .header(header::ACCEPT, accept)
            .body(flux.to_string());

        let response = self.authorized(request).send().await?;
        read_success(response).await
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxClient {
    async fn write_lines(&self, body: String) -> InfluxResult<()> {
        let url = format!("{}/api/v2/write", self.host);
        tracing::debug!(bytes = body.len(), bucket = %self.bucket, "writing lines");

        let request = self
            .http
            .post(&url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(header::CONTENT_TYPE, LINE_PROTOCOL)
            .body(body);

        let response = self.authorized(request).send().await?;
        read_success(response).await.map(|_| ())
    }

    async fn query_csv(&self, flux: &str) -> InfluxResult<String> {
        self.query(flux, "application/csv").await
    }

    async fn query_raw(&self, flux: &str) -> InfluxResult<String> {
        self.query(flux, "application/json").await
    }

    async fn health(&self) -> ServiceStatus {
        probe_health(&self.http, &format!("{}/health", self.host), self.status_timeout).await
    }
}

/// Body of a success response, or [`InfluxError::Status`] carrying the body
async fn read_success(response: Response) -> InfluxResult<String> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(InfluxError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// GET a health URL with its own timeout. Never fails; problems are reported
/// in the returned status.
pub async fn probe_health(http: &Client, url: &str, timeout: Duration) -> ServiceStatus {
    match http.get(url).timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => {
            // A healthy service with an unreadable body still counts as up.
            let info = response
                .json::<Value>()
                .await
                .unwrap_or_else(|_| Value::Object(Default::default()));
            ServiceStatus {
                ok: true,
                info: Some(info),
                ..Default::default()
            }
        }
        Ok(response) => ServiceStatus {
            ok: false,
            status: Some(response.status().as_u16()),
            ..Default::default()
        },
        Err(e) => ServiceStatus {
            ok: false,
            error: Some(e.to_string()),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn config(host: String, token: &str) -> InfluxConfig {
        InfluxConfig {
            host,
            org: "K-Energy_Save".to_string(),
            bucket: "k_db".to_string(),
            token: token.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_writing_lines() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("org".into(), "K-Energy_Save".into()),
                Matcher::UrlEncoded("bucket".into(), "k_db".into()),
                Matcher::UrlEncoded("precision".into(), "s".into()),
            ]))
            .match_header("Authorization", "Token secret")
            .match_header("Content-Type", LINE_PROTOCOL)
            .match_body("machines,device=Ksave01 P=120\nmachines,device=Ksave02 P=118")
            .with_status(204)
            .create_async()
            .await;

        let client = InfluxClient::new(&config(format!("{}/", server.url()), "secret")).unwrap();
        client
            .write_lines("machines,device=Ksave01 P=120\nmachines,device=Ksave02 P=118".to_string())
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_querying_csv() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/query")
            .match_query(Matcher::UrlEncoded("org".into(), "K-Energy_Save".into()))
            .match_header("Content-Type", FLUX)
            .match_header("Accept", "application/csv")
            .match_body("from(bucket: \"k_db\")")
            .with_body(",result,table,_value\n,,0,Site A\n")
            .create_async()
            .await;

        let client = InfluxClient::new(&config(server.url(), "secret")).unwrap();
        let csv = client.query_csv("from(bucket: \"k_db\")").await.unwrap();

        assert_eq!(csv, ",result,table,_value\n,,0,Site A\n");
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_no_authorization_without_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/query")
            .match_query(Matcher::Any)
            .match_header("Authorization", Matcher::Missing)
            .match_header("Accept", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let client = InfluxClient::new(&config(server.url(), "")).unwrap();
        assert_eq!(client.query_raw("x").await.unwrap(), "{}");
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_error_status_carries_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("partial write: field type conflict")
            .create_async()
            .await;

        let client = InfluxClient::new(&config(server.url(), "secret")).unwrap();
        let err = client.write_lines("m a=1".to_string()).await.unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert!(matches!(
            err,
            InfluxError::Status { ref body, .. } if body == "partial write: field type conflict"
        ));
    }

    #[tokio::test]
    async fn test_transport_error_when_unreachable() {
        let client = InfluxClient::new(&config("http://127.0.0.1:1".to_string(), "")).unwrap();
        let err = client.query_csv("x").await.unwrap_err();
        assert!(matches!(err, InfluxError::Transport(_)));
        assert_eq!(err.status(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_health_reports_status() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/health")
            .with_body(r#"{"status":"pass","version":"2.7.1"}"#)
            .create_async()
            .await;

        let client = InfluxClient::new(&config(server.url(), "")).unwrap();
        let status = client.health().await;

        assert!(status.ok);
        assert_eq!(status.info.unwrap()["status"], "pass");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_health_reports_failure_status() {
        let mut server = Server::new_async().await;
        let _down = server
            .mock("GET", "/api/health")
            .with_status(503)
            .create_async()
            .await;

        let status = probe_health(
            &Client::new(),
            &format!("{}/api/health", server.url()),
            Duration::from_secs(2),
        )
        .await;

        assert_eq!(
            status,
            ServiceStatus {
                ok: false,
                status: Some(503),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_health_reports_transport_error() {
        let status =
            probe_health(&Client::new(), "http://127.0.0.1:1/health", Duration::from_secs(2)).await;
        assert!(!status.ok);
        assert!(status.error.is_some());
    }
}
