//! OCR (Optical Character Recognition) Module
//!
//! Turns an uploaded document on disk into text plus a confidence score.
//!
//! # Architecture
//!
//! - `TextDetector` trait is the capability the request handler depends on
//! - `OcrProvider` implements it and picks a backend from `OcrConfig.model`
//! - `GoogleVisionClient` talks to the Cloud Vision REST API
//! - `ServiceAccountTokenSource` mints and caches OAuth2 tokens for it
//!
//! # Configuration
//!
//! OCR behavior is controlled via `OcrConfig` (see `config.rs`):
//! - `model`: Provider selection (e.g., "google/vision")
//! - `client_email` / `private_key`: Service account, exchanged for access tokens
//! - `api_key` / `access_token`: Alternative credentials for the Vision API
//! - `base_url`: Custom endpoint for proxies or test servers
//! - `language_hints`: BCP-47 codes forwarded to the provider
//! - `timeout_secs`: Upper bound for one detection, retries included
//! - `max_retries`: Retries after a rate-limited or failing request
//!
//! # Usage
//!
//! ```rust,ignore
//! let ocr = OcrProvider::new(&config.ocr)?;
//! let output = ocr.detect_text(path, &DocumentMediaType::Png).await?;
//! ```

mod api;
mod auth;
mod provider;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::media::DocumentMediaType;

pub use api::GoogleVisionClient;
pub use auth::ServiceAccountTokenSource;
pub use provider::OcrProvider;

/// Text extracted from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    /// Mean confidence of all detected text blocks, `0.0` when there are none.
    pub confidence: f32,
}

/// Produces text and a confidence score for a file on disk.
#[async_trait]
pub trait TextDetector: Send + Sync {
    async fn detect_text(&self, path: &Path, media_type: &DocumentMediaType) -> Result<OcrOutput>;

    fn is_available(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &str;
}
