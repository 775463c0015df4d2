//! REST client for the Custom Vision training API.

use crate::core::TrainingApi;
use crate::domain::model::{
    Domain, ImageCreateSummary, ImageFileCreateEntry, Project, Region, Tag, TagType,
};
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TRAINING_ENDPOINT_ENV_VAR: &str = "CUSTOM_VISION_TRAINING_ENDPOINT";
pub const TRAINING_KEY_ENV_VAR: &str = "CUSTOM_VISION_TRAINING_KEY";
pub const DEFAULT_API_VERSION: &str = "v3.3";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomVisionSettings {
    pub endpoint: String,
    pub training_key: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl CustomVisionSettings {
    pub fn new(endpoint: impl Into<String>, training_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            training_key: training_key.into(),
            api_version: default_api_version(),
            timeout_seconds: default_timeout_seconds(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }

    /// 從 `CUSTOM_VISION_TRAINING_ENDPOINT` / `CUSTOM_VISION_TRAINING_KEY` 讀取
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(TRAINING_ENDPOINT_ENV_VAR).map_err(|_| {
            PipelineError::MissingConfigError {
                field: TRAINING_ENDPOINT_ENV_VAR.to_string(),
            }
        })?;
        let training_key =
            std::env::var(TRAINING_KEY_ENV_VAR).map_err(|_| PipelineError::MissingConfigError {
                field: TRAINING_KEY_ENV_VAR.to_string(),
            })?;
        Ok(Self::new(endpoint, training_key))
    }
}

impl Validate for CustomVisionSettings {
    fn validate(&self) -> Result<()> {
        validate_url("custom_vision.endpoint", &self.endpoint)?;
        validate_non_empty_string("custom_vision.training_key", &self.training_key)?;
        validate_non_empty_string("custom_vision.api_version", &self.api_version)?;
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageFileCreateBatch<'a> {
    images: Vec<ImageFileBody<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageFileBody<'a> {
    name: &'a str,
    contents: String,
    #[serde(skip_serializing_if = "is_empty")]
    regions: &'a [Region],
    #[serde(skip_serializing_if = "is_empty")]
    tag_ids: &'a [String],
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

pub struct CustomVisionClient {
    client: Client,
    settings: CustomVisionSettings,
}

impl CustomVisionClient {
    pub fn new(settings: CustomVisionSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/customvision/{}/training/{}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.api_version,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("Training-Key", &self.settings.training_key)
    }

    /// 送出請求；遇到 429 或 5xx 依設定重試
    async fn execute(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let current = request.try_clone().ok_or_else(|| {
                PipelineError::processing(format!("Request for {} cannot be retried", operation))
            })?;

            let err = match current.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    PipelineError::ApiStatusError {
                        operation: operation.to_string(),
                        status,
                        body,
                    }
                }
                Err(e) => PipelineError::ApiError(e),
            };

            if !err.is_retryable() || attempt >= self.settings.retry_attempts {
                return Err(err);
            }

            attempt += 1;
            let delay = Duration::from_millis(self.settings.retry_delay_ms * u64::from(attempt));
            tracing::warn!(
                "⚠️ {} failed ({}), retry {}/{} in {:?}",
                operation,
                err,
                attempt,
                self.settings.retry_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn json<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T> {
        let response = self.execute(operation, request).await?;
        tracing::debug!("{} -> {}", operation, response.status());
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TrainingApi for CustomVisionClient {
    async fn get_projects(&self) -> Result<Vec<Project>> {
        self.json("get projects", self.request(reqwest::Method::GET, "projects"))
            .await
    }

    async fn get_domains(&self) -> Result<Vec<Domain>> {
        self.json("get domains", self.request(reqwest::Method::GET, "domains"))
            .await
    }

    async fn create_project(&self, name: &str, domain_id: &str) -> Result<Project> {
        let request = self
            .request(reqwest::Method::POST, "projects")
            .query(&[("name", name), ("domainId", domain_id)]);
        self.json("create project", request).await
    }

    async fn get_tags(&self, project_id: &str) -> Result<Vec<Tag>> {
        let path = format!("projects/{}/tags", project_id);
        self.json("get tags", self.request(reqwest::Method::GET, &path))
            .await
    }

    async fn create_tag(&self, project_id: &str, name: &str, tag_type: TagType) -> Result<Tag> {
        let path = format!("projects/{}/tags", project_id);
        let request = self
            .request(reqwest::Method::POST, &path)
            .query(&[("name", name), ("type", tag_type.as_str())]);
        self.json("create tag", request).await
    }

    async fn create_images_from_files(
        &self,
        project_id: &str,
        entries: &[ImageFileCreateEntry],
    ) -> Result<ImageCreateSummary> {
        let batch = ImageFileCreateBatch {
            images: entries
                .iter()
                .map(|entry| ImageFileBody {
                    name: &entry.name,
                    contents: BASE64.encode(&entry.contents),
                    regions: &entry.regions,
                    tag_ids: &entry.tag_ids,
                })
                .collect(),
        };

        let path = format!("projects/{}/images/files", project_id);
        let request = self.request(reqwest::Method::POST, &path).json(&batch);
        self.json("create images", request).await
    }
}
