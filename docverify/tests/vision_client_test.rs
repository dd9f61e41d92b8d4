mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docverify::config::OcrConfig;
use docverify::error::DocVerifyError;
use docverify::media::DocumentMediaType;
use docverify::ocr::{OcrProvider, TextDetector};

use common::init_test_logger;

fn vision_config(base_url: String) -> OcrConfig {
    OcrConfig {
        model: "google/vision".to_string(),
        api_key: Some("test-key".to_string()),
        base_url: Some(base_url),
        language_hints: vec!["pt".to_string()],
        timeout_secs: 5,
        max_retries: 3,
        ..OcrConfig::default()
    }
}

fn write_document(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn annotate_body(text: &str, confidences: &[f32]) -> serde_json::Value {
    let blocks: Vec<_> = confidences
        .iter()
        .map(|c| json!({ "confidence": c }))
        .collect();
    json!({
        "responses": [{
            "fullTextAnnotation": {
                "text": text,
                "pages": [{ "blocks": blocks }]
            }
        }]
    })
}

#[tokio::test]
async fn image_is_sent_to_images_annotate() {
    init_test_logger();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "requests": [{
                "image": { "content": "aGVsbG8=" },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
                "imageContext": { "languageHints": ["pt"] }
            }]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(annotate_body("NOME\n529.982.247-25\n", &[1.0, 0.5])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.png", b"hello");

    let provider = OcrProvider::new(&vision_config(server.uri())).unwrap();
    assert!(provider.is_available());

    let output = provider
        .detect_text(&file, &DocumentMediaType::Png)
        .await
        .unwrap();

    assert_eq!(output.text, "NOME\n529.982.247-25\n");
    assert!((output.confidence - 0.75).abs() < f32::EPSILON);
}

#[tokio::test]
async fn pdf_is_sent_to_files_annotate() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/files:annotate"))
        .and(body_partial_json(json!({
            "requests": [{
                "inputConfig": { "mimeType": "application/pdf" },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responses": [{
                "responses": [
                    { "fullTextAnnotation": { "text": "Nome\n", "pages": [{ "blocks": [{ "confidence": 0.8 }] }] } },
                    { "fullTextAnnotation": { "text": "111.444.777-35\n", "pages": [{ "blocks": [{ "confidence": 0.6 }] }] } }
                ],
                "totalPages": 2
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.pdf", b"%PDF-1.4");

    let provider = OcrProvider::new(&vision_config(server.uri())).unwrap();
    let output = provider
        .detect_text(&file, &DocumentMediaType::Pdf)
        .await
        .unwrap();

    assert_eq!(output.text, "Nome\n111.444.777-35\n");
    assert!((output.confidence - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn access_token_is_sent_as_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .and(header("authorization", "Bearer oauth-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responses": [{}] })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.jpg", &[0xFF, 0xD8]);

    let config = OcrConfig {
        api_key: None,
        access_token: Some("oauth-token".to_string()),
        ..vision_config(server.uri())
    };
    let provider = OcrProvider::new(&config).unwrap();
    let output = provider
        .detect_text(&file, &DocumentMediaType::Jpeg)
        .await
        .unwrap();

    assert_eq!(output.text, "");
    assert_eq!(output.confidence, 0.0);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(annotate_body("nome", &[0.9])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.png", b"png");

    let provider = OcrProvider::new(&vision_config(server.uri())).unwrap();
    let output = provider
        .detect_text(&file, &DocumentMediaType::Png)
        .await
        .unwrap();

    assert_eq!(output.text, "nome");
}

#[tokio::test]
async fn retries_stop_after_max_retries() {
    let server = MockServer::start().await;

    // One initial attempt plus two retries.
    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.png", b"png");

    let config = OcrConfig {
        max_retries: 2,
        ..vision_config(server.uri())
    };
    let provider = OcrProvider::new(&config).unwrap();
    let err = provider
        .detect_text(&file, &DocumentMediaType::Png)
        .await
        .unwrap_err();

    assert!(matches!(err, DocVerifyError::Ocr(ref msg) if msg.contains("after 2 retries")));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(annotate_body("nome", &[0.9]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.png", b"png");

    let config = OcrConfig {
        timeout_secs: 1,
        ..vision_config(server.uri())
    };
    let provider = OcrProvider::new(&config).unwrap();
    let err = provider
        .detect_text(&file, &DocumentMediaType::Png)
        .await
        .unwrap_err();

    assert!(!err.is_client_error());
    assert!(
        matches!(err, DocVerifyError::Ocr(ref msg) if msg.contains("timed out after 1 seconds")),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn service_account_token_is_minted_once_and_reused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "minted-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .and(header("authorization", "Bearer minted-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(annotate_body("Nome", &[0.9])))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.png", b"png");

    let config = OcrConfig {
        api_key: None,
        client_email: Some("ocr@project.iam.gserviceaccount.com".to_string()),
        private_key: Some(include_str!("fixtures/service_account_key.pem").to_string()),
        token_uri: Some(format!("{}/token", server.uri())),
        ..vision_config(server.uri())
    };
    let provider = OcrProvider::new(&config).unwrap();
    assert!(provider.is_available());

    for _ in 0..2 {
        let output = provider
            .detect_text(&file, &DocumentMediaType::Png)
            .await
            .unwrap();
        assert_eq!(output.text, "Nome");
    }
}

#[tokio::test]
async fn rejected_token_exchange_is_an_ocr_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.png", b"png");

    let config = OcrConfig {
        api_key: None,
        client_email: Some("ocr@project.iam.gserviceaccount.com".to_string()),
        private_key: Some(include_str!("fixtures/service_account_key.pem").to_string()),
        token_uri: Some(format!("{}/token", server.uri())),
        ..vision_config(server.uri())
    };
    let provider = OcrProvider::new(&config).unwrap();
    let err = provider
        .detect_text(&file, &DocumentMediaType::Png)
        .await
        .unwrap_err();

    assert!(matches!(err, DocVerifyError::Ocr(ref msg) if msg.contains("invalid_grant")));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.png", b"png");

    let provider = OcrProvider::new(&vision_config(server.uri())).unwrap();
    let err = provider
        .detect_text(&file, &DocumentMediaType::Png)
        .await
        .unwrap_err();

    assert!(matches!(err, DocVerifyError::Ocr(ref msg) if msg.contains("API key not valid")));
}

#[tokio::test]
async fn per_image_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/images:annotate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responses": [{ "error": { "code": 3, "message": "Bad image data." } }]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_document(&dir, "doc.png", b"not really a png");

    let provider = OcrProvider::new(&vision_config(server.uri())).unwrap();
    let err = provider
        .detect_text(&file, &DocumentMediaType::Png)
        .await
        .unwrap_err();

    assert!(!err.is_client_error());
    assert!(err.to_string().contains("Bad image data."));
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let provider = OcrProvider::new(&vision_config("http://127.0.0.1:9".to_string())).unwrap();
    let err = provider
        .detect_text(
            std::path::Path::new("/definitely/not/here.png"),
            &DocumentMediaType::Png,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DocVerifyError::Io(_)));
}
