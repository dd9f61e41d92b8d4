use std::sync::Arc;

use crate::config::Config;
use crate::ocr::TextDetector;
use crate::verification::DocumentVerifier;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ocr: Arc<dyn TextDetector>,
    pub verifier: DocumentVerifier,
}

impl AppState {
    pub fn new(config: Config, ocr: Arc<dyn TextDetector>) -> Self {
        let config = Arc::new(config);
        let verifier = DocumentVerifier::new(ocr.clone(), config.upload.dir.clone());

        Self {
            config,
            ocr,
            verifier,
        }
    }
}
