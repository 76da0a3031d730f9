use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::types::{ExtractRequest, ExtractResponse, FingerprintDescriptor, SearchOutcome};
use crate::error::ServiceError;

/// Remote fingerprint extraction and search.
#[async_trait]
pub trait FingerprintService: Send + Sync {
    /// 16-bit samples at the fingerprint rate -> opaque descriptor.
    async fn extract(&self, samples: &[i16]) -> Result<FingerprintDescriptor, ServiceError>;

    /// Descriptor -> candidate tags.
    async fn search(&self, descriptor: &FingerprintDescriptor) -> Result<SearchOutcome, ServiceError>;
}

#[derive(Clone)]
pub struct HttpFingerprintService {
    client: Client,
    extract_url: String,
    search_url: String,
}

impl HttpFingerprintService {
    pub fn new(extract_url: impl Into<String>, search_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout) // Network-level bound on every call
                .build()
                .unwrap_or_default(),
            extract_url: extract_url.into(),
            search_url: search_url.into(),
        }
    }
}

#[async_trait]
impl FingerprintService for HttpFingerprintService {
    async fn extract(&self, samples: &[i16]) -> Result<FingerprintDescriptor, ServiceError> {
        let response = self
            .client
            .post(&self.extract_url)
            .json(&ExtractRequest { samples })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let parsed: ExtractResponse =
            serde_json::from_str(&body).map_err(|e| ServiceError::Malformed(e.to_string()))?;
        let descriptor = FingerprintDescriptor::from_response(parsed)?;
        debug!("FingerprintService: extracted descriptor from {} samples", samples.len());
        Ok(descriptor)
    }

    async fn search(&self, descriptor: &FingerprintDescriptor) -> Result<SearchOutcome, ServiceError> {
        let response = self
            .client
            .post(&self.search_url)
            .json(&descriptor.data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        Ok(SearchOutcome::parse(&body))
    }
}
