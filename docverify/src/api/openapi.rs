use axum::Json;
use utoipa::OpenApi;

use super::extractors;
use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Docverify API",
        version = "1.0.0",
        description = "Identity document verification: OCR text extraction and CPF checksum validation.",
    ),
    paths(
        handlers::health::health_check,
        handlers::documents::verify_document,
    ),
    components(schemas(
        extractors::VerifyDocumentRequest,
        crate::verification::DocumentVerdict,
        crate::error::ErrorBody,
        handlers::health::HealthData,
        handlers::health::OcrStatus,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "documents", description = "Document verification"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
