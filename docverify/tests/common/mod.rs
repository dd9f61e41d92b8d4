// Common test utilities for integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;

use docverify::config::{Config, OcrConfig, ServerConfig, UploadConfig};
use docverify::error::{DocVerifyError, Result};
use docverify::media::DocumentMediaType;
use docverify::ocr::{OcrOutput, TextDetector};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn test_config(upload_dir: &Path) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_upload_bytes: 1024 * 1024,
        },
        upload: UploadConfig {
            dir: upload_dir.to_path_buf(),
        },
        ocr: OcrConfig::default(),
    }
}

/// OCR double returning canned text and recording what it was asked to read.
pub struct FakeDetector {
    pub text: std::result::Result<String, String>,
    pub confidence: f32,
    pub calls: AtomicUsize,
    pub media_types: std::sync::Mutex<Vec<DocumentMediaType>>,
}

impl FakeDetector {
    pub fn returning(text: &str, confidence: f32) -> Arc<Self> {
        Arc::new(Self {
            text: Ok(text.to_string()),
            confidence,
            calls: AtomicUsize::new(0),
            media_types: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Err(message.to_string()),
            confidence: 0.0,
            calls: AtomicUsize::new(0),
            media_types: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextDetector for FakeDetector {
    async fn detect_text(&self, path: &Path, media_type: &DocumentMediaType) -> Result<OcrOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.media_types.lock().unwrap().push(media_type.clone());
        assert!(path.exists(), "document must be on disk while OCR runs");

        match &self.text {
            Ok(text) => Ok(OcrOutput {
                text: text.clone(),
                confidence: self.confidence,
            }),
            Err(message) => Err(DocVerifyError::Ocr(message.clone())),
        }
    }

    fn provider_name(&self) -> &str {
        "fake"
    }
}

pub const BOUNDARY: &str = "docverify-test-boundary";

/// Build a multipart body with a single file field.
pub fn multipart_file(field: &str, file_name: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    if let Some(ct) = content_type {
        body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
