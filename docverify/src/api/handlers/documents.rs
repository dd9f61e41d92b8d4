use axum::extract::State;
use axum::Json;

use crate::api::extractors::{DocumentSource, VerifyDocumentInput, VerifyDocumentRequest};
use crate::api::state::AppState;
use crate::error::{DocVerifyError, ErrorBody, Result};
use crate::media::resolve_upload_mime;
use crate::upload::parse_data_uri;
use crate::verification::{DocumentUpload, DocumentVerdict};

pub const MISSING_DOCUMENT: &str = "No file uploaded or base64 provided";

/// `POST /verify-document`
#[utoipa::path(
    post,
    path = "/verify-document",
    tag = "documents",
    request_body(
        content = VerifyDocumentRequest,
        content_type = "application/json",
        description = "A base64 data URI. Alternatively send `multipart/form-data` with a `document` file field.",
    ),
    responses(
        (status = 200, description = "Verification verdict", body = DocumentVerdict),
        (status = 400, description = "Missing input, malformed base64, or unsupported file type", body = ErrorBody),
        (status = 500, description = "OCR or processing failure", body = ErrorBody),
    )
)]
pub async fn verify_document(
    State(state): State<AppState>,
    VerifyDocumentInput(source): VerifyDocumentInput,
) -> Result<Json<DocumentVerdict>> {
    let source =
        source.ok_or_else(|| DocVerifyError::Validation(MISSING_DOCUMENT.to_string()))?;

    let upload = into_upload(source)?;
    tracing::debug!(mime = %upload.mime, size = upload.bytes.len(), "Received document");

    let verdict = state.verifier.verify(upload).await?;
    Ok(Json(verdict))
}

fn into_upload(source: DocumentSource) -> Result<DocumentUpload> {
    match source {
        DocumentSource::File {
            content_type,
            file_name,
            bytes,
        } => {
            let mime = resolve_upload_mime(content_type.as_deref(), file_name.as_deref(), &bytes)
                .ok_or_else(|| {
                    DocVerifyError::UnsupportedMediaType("application/octet-stream".to_string())
                })?;
            Ok(DocumentUpload { mime, bytes })
        }
        DocumentSource::Base64(uri) => {
            let data = parse_data_uri(&uri)?;
            Ok(DocumentUpload {
                mime: data.mime,
                bytes: data.bytes,
            })
        }
    }
}
