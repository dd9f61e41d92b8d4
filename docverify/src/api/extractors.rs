use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::Deserialize;

use crate::error::DocVerifyError;

/// Multipart field carrying the document file.
pub const DOCUMENT_FIELD: &str = "document";
/// JSON (or multipart text) field carrying a base64 data URI.
pub const BASE64_FIELD: &str = "base64";

/// JSON body accepted by `POST /verify-document`.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct VerifyDocumentRequest {
    /// Data URI, e.g. `data:image/png;base64,iVBORw0...`
    pub base64: Option<String>,
}

/// Where the document came from, before decoding.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    File {
        content_type: Option<String>,
        file_name: Option<String>,
        bytes: Vec<u8>,
    },
    Base64(String),
}

/// Accepts either a multipart upload or a JSON body. `None` means the
/// request carried no usable document.
#[derive(Debug)]
pub struct VerifyDocumentInput(pub Option<DocumentSource>);

impl<S> FromRequest<S> for VerifyDocumentInput
where
    S: Send + Sync,
{
    type Rejection = DocVerifyError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await?;
            read_multipart(multipart).await.map(Self)
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<VerifyDocumentRequest>::from_request(req, state).await?;
            Ok(Self(non_empty(body.base64).map(DocumentSource::Base64)))
        } else {
            Ok(Self(None))
        }
    }
}

/// A `document` file takes precedence over a `base64` text field.
async fn read_multipart(
    mut multipart: Multipart,
) -> Result<Option<DocumentSource>, DocVerifyError> {
    let mut file: Option<DocumentSource> = None;
    let mut base64: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            DOCUMENT_FIELD => {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let bytes = field.bytes().await.map_err(map_multipart_error)?;

                if bytes.is_empty() {
                    continue;
                }

                file = Some(DocumentSource::File {
                    content_type,
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            BASE64_FIELD => {
                base64 = non_empty(Some(field.text().await.map_err(map_multipart_error)?));
            }
            _ => {}
        }
    }

    Ok(file.or_else(|| base64.map(DocumentSource::Base64)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn map_multipart_error(err: MultipartError) -> DocVerifyError {
    DocVerifyError::Validation(format!("Failed to read upload: {}", err.body_text()))
}

impl From<MultipartRejection> for DocVerifyError {
    fn from(rejection: MultipartRejection) -> Self {
        DocVerifyError::Validation(rejection.body_text())
    }
}

impl From<JsonRejection> for DocVerifyError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> DocVerifyError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            DocVerifyError::Validation(format!("Invalid JSON: {}", err.body_text()))
        }
        JsonRejection::JsonSyntaxError(err) => {
            DocVerifyError::Validation(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => {
            DocVerifyError::Validation(
                "Missing `Content-Type: application/json` header".to_string(),
            )
        }
        JsonRejection::BytesRejection(err) => {
            DocVerifyError::Validation(format!(
                "Failed to read request body: {}",
                err.body_text()
            ))
        }
        _ => DocVerifyError::Validation(rejection.body_text()),
    }
}
