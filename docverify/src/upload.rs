//! Inbound document storage.
//!
//! Uploaded bytes are written to a uniquely named file in the upload
//! directory for the duration of one request. [`TempDocument`] owns that
//! file and deletes it when dropped, so early returns and errors never leave
//! documents behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::error::{DocVerifyError, Result};
use crate::media::DocumentMediaType;

pub const INVALID_BASE64: &str = "Invalid base64 format";

/// Standard alphabet with optional padding. URL-safe `-` and `_` are mapped
/// onto `+` and `/` before decoding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:(.+);base64,(.+)$").expect("valid data URI regex"));

/// A decoded `data:<mime>;base64,<payload>` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decode a base64 data URI. Any shape or payload problem is reported as
/// `Invalid base64 format`.
pub fn parse_data_uri(input: &str) -> Result<DataUri> {
    let invalid = || DocVerifyError::Validation(INVALID_BASE64.to_string());

    let captures = DATA_URI.captures(input.trim()).ok_or_else(invalid)?;
    let mime = captures[1].trim().to_string();
    let payload: String = captures[2]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = LENIENT.decode(payload.as_bytes()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok(DataUri { mime, bytes })
}

/// A document written to the upload directory, removed on drop.
#[derive(Debug)]
pub struct TempDocument {
    file: NamedTempFile,
    media_type: DocumentMediaType,
}

impl TempDocument {
    /// Write `bytes` to a fresh file named `doc-<random><ext>` under `dir`.
    pub async fn persist(
        dir: &Path,
        media_type: DocumentMediaType,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let dir = dir.to_path_buf();
        let extension = media_type.extension();

        let file = tokio::task::spawn_blocking(move || write_temp_file(&dir, extension, &bytes))
            .await
            .map_err(|e| DocVerifyError::Internal(format!("Upload task panicked: {e}")))??;

        tracing::debug!(path = %file.path().display(), %media_type, "Stored upload");

        Ok(Self { file, media_type })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn media_type(&self) -> &DocumentMediaType {
        &self.media_type
    }

    /// Delete the file now, logging instead of failing if that is not possible.
    pub fn remove(self) {
        let path: PathBuf = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary upload");
        }
    }
}

fn write_temp_file(dir: &Path, extension: &str, bytes: &[u8]) -> Result<NamedTempFile> {
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::Builder::new()
        .prefix("doc-")
        .suffix(extension)
        .rand_bytes(16)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;

    Ok(file)
}
