//! HTTP client for the oneM2M sink

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::types::Category;

use super::envelope::{self, ContentInstance};

/// CSE resource root on the sink
pub const RESOURCE_ROOT: &str = "Mobius";

/// Request identifier sent with every request
const REQUEST_ID: &str = "12345";

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct SinkResponse {
    pub status: u16,
    pub body: String,
}

impl SinkResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for the sink
pub struct SinkClient {
    http_client: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl SinkClient {
    /// Create a new sink client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: &SinkConfig) -> Result<Self> {
        config.validate()?;

        let user_id = config
            .user_id
            .clone()
            .ok_or_else(|| Error::Config("sink.user_id is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(envelope::CONTENT_TYPE));
        headers.insert(
            HeaderName::from_static("x-m2m-ri"),
            HeaderValue::from_static(REQUEST_ID),
        );
        headers.insert(
            HeaderName::from_static("x-m2m-origin"),
            HeaderValue::from_str(&config.origin)
                .map_err(|e| Error::Config(format!("invalid origin: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            user_id,
        })
    }

    /// URL of the container a category's chunks are posted to
    pub fn container_url(&self, category: Category) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url,
            RESOURCE_ROOT,
            urlencoding::encode(&self.user_id),
            category.group(),
            category.container()
        )
    }

    /// Post one chunk payload as a content instance.
    ///
    /// Any HTTP response, including non-2xx, is returned as `Ok`; `Err` means
    /// the request never completed.
    pub async fn send_chunk(&self, category: Category, payload: &str) -> Result<SinkResponse> {
        let url = self.container_url(category);
        let body = ContentInstance::new(payload).to_json()?;

        let response = self.http_client.post(&url).body(body).send().await?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(SinkResponse { status, body })
    }
}
