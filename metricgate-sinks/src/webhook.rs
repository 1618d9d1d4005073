//! Webhook sink: POSTs every batch to an HTTP endpoint

use async_trait::async_trait;
use metricgate_core::Batch;
use metricgate_interfaces::{MetricSink, SinkError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;

use crate::SinkBuildError;

/// Header carrying the batch id so the receiver can drop replays
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Sends each batch as a JSON body.
///
/// Network errors, `429` and `5xx` responses are transient; any other
/// non-success status is fatal.
#[derive(Debug)]
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration, headers: HashMap<String, String>) -> Result<Self, SinkBuildError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SinkBuildError::InvalidConfig(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SinkBuildError::InvalidConfig(format!("header value for '{}': {}", name, e)))?;
            default_headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(timeout)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(concat!("metricgate/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn classify(status: StatusCode, retry_after: Option<Duration>, body: String) -> SinkError {
    let message = format!("webhook responded {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SinkError::Transient { message, retry_after }
    } else {
        SinkError::fatal(message)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl MetricSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn flush(&self, batch: &Batch) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .header(IDEMPOTENCY_HEADER, batch.id().to_string())
            .json(batch)
            .send()
            .await
            .map_err(|e| SinkError::transient(format!("webhook request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Webhook rejected batch {} with status {}", batch.id(), status);
        Err(classify(status, retry_after, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricgate_core::{BatchEntry, FlushTrigger, MetricSample, MetricType, ServerId};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn batch() -> Batch {
        let sample = MetricSample::new(ServerId::Numeric(3), MetricType::Load, 1.25, "load", 1_700_000_000_000).unwrap();
        Batch::new(vec![BatchEntry::one_shot(sample)], FlushTrigger::Size)
    }

    fn sink(server: &MockServer, headers: HashMap<String, String>) -> WebhookSink {
        WebhookSink::new(format!("{}/batches", server.uri()), Duration::from_secs(2), headers).unwrap()
    }

    #[tokio::test]
    async fn test_posts_batch_with_idempotency_key() {
        let server = MockServer::start().await;
        let batch = batch();
        Mock::given(method("POST"))
            .and(path("/batches"))
            .and(header(IDEMPOTENCY_HEADER, batch.id().to_string().as_str()))
            .and(header("x-tenant", "ops"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HashMap::new();
        headers.insert("X-Tenant".to_string(), "ops".to_string());
        sink(&server, headers).flush(&batch).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["batch_id"], batch.id().to_string());
        assert_eq!(body["trigger"], "size");
        assert_eq!(body["samples"][0]["value"], 1.25);
    }

    #[tokio::test]
    async fn test_server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists(IDEMPOTENCY_HEADER))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = sink(&server, HashMap::new()).flush(&batch()).await.unwrap_err();
        assert!(matches!(err, SinkError::Transient { .. }));
    }

    #[tokio::test]
    async fn test_throttling_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let err = sink(&server, HashMap::new()).flush(&batch()).await.unwrap_err();
        match err {
            SinkError::Transient { retry_after, .. } => assert_eq!(retry_after, Some(Duration::from_secs(3))),
            other => panic!("expected transient error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_errors_are_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad schema"))
            .mount(&server)
            .await;

        let err = sink(&server, HashMap::new()).flush(&batch()).await.unwrap_err();
        match err {
            SinkError::Fatal { message } => assert!(message.contains("bad schema")),
            other => panic!("expected fatal error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let sink = WebhookSink::new(
            "http://127.0.0.1:9/batches".to_string(),
            Duration::from_millis(200),
            HashMap::new(),
        )
        .unwrap();
        let err = sink.flush(&batch()).await.unwrap_err();
        assert!(matches!(err, SinkError::Transient { .. }));
    }
}
