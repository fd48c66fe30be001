// src/recording/sender.rs
//! Network sender capability
//!
//! A sender makes exactly one attempt per call and reports success as a
//! boolean. Retry policy belongs to the delivery scheduler.

use crate::utils::config::DeliverySettings;
use crate::utils::errors::{Result, TrackerError};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::{debug, warn};

/// Transport for batch bodies
#[async_trait]
pub trait Sender: Send + Sync {
    /// Deliver one body; `true` only when the backend accepted it
    async fn send(&self, body: Bytes, headers: HeaderMap) -> bool;
}

/// Sender posting bodies to the ingestion endpoint over HTTP
pub struct HttpSender {
    endpoint: Uri,
    authorization: Option<HeaderValue>,
    timeout: Duration,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpSender {
    pub fn new(settings: &DeliverySettings) -> Result<Self> {
        let endpoint: Uri = settings.ingest_url.parse().map_err(|e| {
            TrackerError::Configuration(format!(
                "Invalid ingest URL {:?}: {}",
                settings.ingest_url, e
            ))
        })?;

        let authorization = settings
            .project_key
            .as_deref()
            .map(|key| {
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e| {
                    TrackerError::Configuration(format!("Invalid project key: {}", e))
                })
            })
            .transpose()?;

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            endpoint,
            authorization,
            timeout: settings.send_timeout(),
            client,
        })
    }

    async fn post(&self, body: Bytes, headers: HeaderMap) -> Result<()> {
        let len = body.len();
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone());

        if let Some(request_headers) = builder.headers_mut() {
            request_headers.extend(headers);
            if let Some(auth) = &self.authorization {
                request_headers.insert(AUTHORIZATION, auth.clone());
            }
        }

        let request = builder
            .body(Full::new(body))
            .map_err(|e| TrackerError::SendFailed(format!("Failed to build request: {}", e)))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| TrackerError::SendFailed(format!("Timed out after {:?}", self.timeout)))?
            .map_err(|e| TrackerError::SendFailed(format!("Request error: {}", e)))?;

        let status = response.status();

        // Drain the body so the connection can be reused
        let _ = response.into_body().collect().await;

        if !status.is_success() {
            return Err(TrackerError::SendFailed(format!(
                "Ingest responded {}",
                status
            )));
        }

        debug!("Delivered {} bytes to {} ({})", len, self.endpoint, status);
        Ok(())
    }
}

#[async_trait]
impl Sender for HttpSender {
    async fn send(&self, body: Bytes, headers: HeaderMap) -> bool {
        match self.post(body, headers).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Batch delivery to {} failed: {}", self.endpoint, e);
                false
            }
        }
    }
}
