use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{OcrConfig, DEFAULT_TOKEN_URI, DEFAULT_VISION_BASE_URL};
use crate::error::{DocVerifyError, Result};
use crate::media::DocumentMediaType;

use super::auth::ServiceAccountTokenSource;
use super::OcrOutput;

const FEATURE_DOCUMENT_TEXT: &str = "DOCUMENT_TEXT_DETECTION";

/// The synchronous file endpoint reads at most five pages.
const PDF_PAGES: [u32; 5] = [1, 2, 3, 4, 5];

#[derive(Clone, Debug)]
enum Credentials {
    ApiKey(String),
    Bearer(String),
    ServiceAccount(Arc<ServiceAccountTokenSource>),
}

/// Client for the Google Cloud Vision `images:annotate` and `files:annotate`
/// endpoints.
#[derive(Clone, Debug)]
pub struct GoogleVisionClient {
    client: Client,
    credentials: Credentials,
    base_url: String,
    language_hints: Vec<String>,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<R> {
    requests: Vec<R>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest<'a> {
    image: ImageContent,
    features: Vec<Feature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_context: Option<ImageContext<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileRequest<'a> {
    input_config: InputConfig,
    features: Vec<Feature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_context: Option<ImageContext<'a>>,
    pages: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig {
    content: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext<'a> {
    language_hints: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ImageBatchResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
struct FileBatchResponse {
    #[serde(default)]
    responses: Vec<AnnotateFileResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateFileResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
    error: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Default, Deserialize)]
struct Page {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Default, Deserialize)]
struct Block {
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl Status {
    fn into_error(self) -> DocVerifyError {
        DocVerifyError::Ocr(format!("Vision API error {}: {}", self.code, self.message))
    }
}

impl GoogleVisionClient {
    /// Credentials are picked in this order: access token, service account,
    /// API key.
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocVerifyError::Ocr(format!("Failed to create HTTP client: {e}")))?;

        let credentials = if let Some(token) = &config.access_token {
            Credentials::Bearer(token.clone())
        } else if let (Some(email), Some(key)) = (&config.client_email, &config.private_key) {
            let token_uri = config.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
            let source = ServiceAccountTokenSource::new(client.clone(), email, key, token_uri)?;
            Credentials::ServiceAccount(Arc::new(source))
        } else if let Some(key) = &config.api_key {
            Credentials::ApiKey(key.clone())
        } else {
            return Err(DocVerifyError::Ocr(
                "Service account, access token, or API key required for Google Vision"
                    .to_string(),
            ));
        };

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_VISION_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            credentials,
            base_url,
            language_hints: config.language_hints.clone(),
            max_retries: config.max_retries,
        })
    }

    pub async fn detect_text(
        &self,
        path: &Path,
        media_type: &DocumentMediaType,
    ) -> Result<OcrOutput> {
        let bytes = tokio::fs::read(path).await?;
        self.detect_text_bytes(&bytes, media_type).await
    }

    pub async fn detect_text_bytes(
        &self,
        bytes: &[u8],
        media_type: &DocumentMediaType,
    ) -> Result<OcrOutput> {
        let content = STANDARD.encode(bytes);

        let annotations = if media_type.is_pdf() {
            let request = BatchRequest {
                requests: vec![FileRequest {
                    input_config: InputConfig {
                        content,
                        mime_type: media_type.mime().to_string(),
                    },
                    features: document_text_features(),
                    image_context: self.image_context(),
                    pages: PDF_PAGES.to_vec(),
                }],
            };
            let response: FileBatchResponse = self.post("files:annotate", &request).await?;
            flatten_file_responses(response)?
        } else {
            let request = BatchRequest {
                requests: vec![ImageRequest {
                    image: ImageContent { content },
                    features: document_text_features(),
                    image_context: self.image_context(),
                }],
            };
            let response: ImageBatchResponse = self.post("images:annotate", &request).await?;
            response.responses
        };

        summarize(annotations)
    }

    fn image_context(&self) -> Option<ImageContext<'_>> {
        if self.language_hints.is_empty() {
            None
        } else {
            Some(ImageContext {
                language_hints: &self.language_hints,
            })
        }
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match &self.credentials {
            Credentials::ApiKey(key) => request.query(&[("key", key)]),
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::ServiceAccount(source) => {
                request.bearer_auth(source.access_token().await?)
            }
        })
    }

    async fn post<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, method);
        let mut retries = 0;

        loop {
            let response = self
                .authorize(self.client.post(&url))
                .await?
                .json(body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<T>().await.map_err(|e| {
                            DocVerifyError::Ocr(format!("Failed to parse response: {e}"))
                        });
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        if retries >= self.max_retries {
                            return Err(DocVerifyError::Ocr(format!(
                                "API request failed after {retries} retries: {status}"
                            )));
                        }
                        retries += 1;
                        tracing::warn!(
                            %status,
                            attempt = retries,
                            "Vision API request failed, retrying"
                        );
                        tokio::time::sleep(backoff_delay(retries)).await;
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(DocVerifyError::Ocr(format!(
                            "API request failed: {status} - {body}"
                        )));
                    }
                }
                Err(e) => {
                    if retries >= self.max_retries {
                        return Err(DocVerifyError::Ocr(format!(
                            "API request failed after {retries} retries: {e}"
                        )));
                    }
                    retries += 1;
                    tracing::warn!(
                        error = %e,
                        attempt = retries,
                        "Vision API unreachable, retrying"
                    );
                    tokio::time::sleep(backoff_delay(retries)).await;
                }
            }
        }
    }
}

fn document_text_features() -> Vec<Feature> {
    vec![Feature {
        kind: FEATURE_DOCUMENT_TEXT,
    }]
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100 * 2_u64.pow(attempt.min(10)))
}

fn flatten_file_responses(batch: FileBatchResponse) -> Result<Vec<AnnotateImageResponse>> {
    let mut pages = Vec::new();
    for file in batch.responses {
        if let Some(status) = file.error {
            return Err(status.into_error());
        }
        pages.extend(file.responses);
    }
    Ok(pages)
}

/// Concatenate page text and average block confidence over every page.
/// Blocks without a confidence count as zero.
fn summarize(responses: Vec<AnnotateImageResponse>) -> Result<OcrOutput> {
    let mut text = String::new();
    let mut total_confidence = 0.0_f32;
    let mut count = 0_usize;

    for response in responses {
        if let Some(status) = response.error {
            return Err(status.into_error());
        }

        let Some(annotation) = response.full_text_annotation else {
            continue;
        };

        text.push_str(&annotation.text);
        for block in annotation.pages.iter().flat_map(|p| &p.blocks) {
            total_confidence += block.confidence.unwrap_or(0.0);
            count += 1;
        }
    }

    let confidence = if count > 0 {
        total_confidence / count as f32
    } else {
        0.0
    };

    Ok(OcrOutput { text, confidence })
}
