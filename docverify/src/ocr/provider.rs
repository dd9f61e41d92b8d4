use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::error::{DocVerifyError, Result};
use crate::media::DocumentMediaType;

use super::api::GoogleVisionClient;
use super::{OcrOutput, TextDetector};

#[derive(Clone)]
enum OcrBackend {
    GoogleVision { client: GoogleVisionClient },
    Unavailable { reason: String },
}

#[derive(Clone)]
pub struct OcrProvider {
    backend: OcrBackend,
    config: OcrConfig,
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let model_lower = config.model.to_lowercase();
        let provider_prefix = model_lower.split('/').next().unwrap_or("google");

        let backend = match provider_prefix {
            "google" | "gcp" if !config.has_credentials() => {
                let reason = "Google Vision OCR backend unavailable: no credentials configured \
                    (set GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY, GOOGLE_ACCESS_TOKEN, \
                    or GOOGLE_VISION_API_KEY)"
                    .to_string();
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
            "google" | "gcp" => match GoogleVisionClient::new(config) {
                Ok(client) => {
                    info!("Google Vision OCR backend initialized");
                    OcrBackend::GoogleVision { client }
                }
                Err(e) => {
                    let reason = format!("Google Vision OCR backend unavailable: {e}");
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
            other => {
                let reason = format!("Unknown OCR provider '{other}'");
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
        };

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    async fn detect_internal(
        &self,
        path: &Path,
        media_type: &DocumentMediaType,
    ) -> Result<OcrOutput> {
        match &self.backend {
            OcrBackend::GoogleVision { client } => client.detect_text(path, media_type).await,
            OcrBackend::Unavailable { reason } => {
                Err(DocVerifyError::OcrUnavailable(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl TextDetector for OcrProvider {
    async fn detect_text(&self, path: &Path, media_type: &DocumentMediaType) -> Result<OcrOutput> {
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);

        let result =
            tokio::time::timeout(timeout_duration, self.detect_internal(path, media_type)).await;

        match result {
            Ok(inner_result) => inner_result,
            Err(_) => Err(DocVerifyError::Ocr(format!(
                "OCR operation timed out after {} seconds",
                self.config.timeout_secs
            ))),
        }
    }

    fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    fn provider_name(&self) -> &str {
        match self.backend {
            OcrBackend::GoogleVision { .. } => "google-vision",
            OcrBackend::Unavailable { .. } => "unavailable",
        }
    }
}
