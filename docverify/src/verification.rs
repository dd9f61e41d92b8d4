use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cpf::{find_cpf, is_valid_cpf, mask_cpf};
use crate::error::Result;
use crate::media::DocumentMediaType;
use crate::ocr::{OcrOutput, TextDetector};
use crate::upload::TempDocument;

/// Marker word that must appear somewhere in the document text.
const NAME_MARKER: &str = "nome";

/// Outcome of verifying one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVerdict {
    /// CPF found, checksum-valid, and the name marker present.
    pub is_document_valid: bool,
    /// First punctuated CPF found in the text.
    #[serde(rename = "extractedCPF")]
    pub extracted_cpf: Option<String>,
    #[serde(rename = "isCPFValid")]
    pub is_cpf_valid: bool,
    pub contains_name: bool,
    /// Mean OCR block confidence in `[0, 1]`.
    pub confidence: f32,
    pub extracted_text: String,
}

impl DocumentVerdict {
    /// Apply the CPF and name checks to OCR output.
    pub fn from_ocr(output: OcrOutput) -> Self {
        let extracted_cpf = find_cpf(&output.text).map(str::to_string);
        let is_cpf_valid = extracted_cpf.as_deref().is_some_and(is_valid_cpf);
        let contains_name = output.text.to_lowercase().contains(NAME_MARKER);
        let contains_cpf = extracted_cpf.is_some();

        Self {
            is_document_valid: is_cpf_valid && contains_name && contains_cpf,
            extracted_cpf,
            is_cpf_valid,
            contains_name,
            confidence: output.confidence,
            extracted_text: output.text,
        }
    }
}

/// A document as received from the client, before any policy is applied.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Runs an upload through storage, OCR, and the CPF checks.
#[derive(Clone)]
pub struct DocumentVerifier {
    detector: Arc<dyn TextDetector>,
    upload_dir: PathBuf,
}

impl DocumentVerifier {
    pub fn new(detector: Arc<dyn TextDetector>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            detector,
            upload_dir: upload_dir.into(),
        }
    }

    /// Unsupported media types are rejected before anything touches disk or
    /// the OCR provider. The stored copy is removed whatever the outcome.
    pub async fn verify(&self, upload: DocumentUpload) -> Result<DocumentVerdict> {
        let media_type = DocumentMediaType::require(&upload.mime)?;

        let document = TempDocument::persist(&self.upload_dir, media_type, upload.bytes).await?;
        let detected = self
            .detector
            .detect_text(document.path(), document.media_type())
            .await;
        document.remove();

        let verdict = DocumentVerdict::from_ocr(detected?);

        let masked_cpf = verdict.extracted_cpf.as_deref().map(mask_cpf);
        tracing::info!(
            valid = verdict.is_document_valid,
            cpf = masked_cpf.as_deref().unwrap_or("none"),
            cpf_valid = verdict.is_cpf_valid,
            contains_name = verdict.contains_name,
            confidence = verdict.confidence,
            "Document verified"
        );

        Ok(verdict)
    }
}
