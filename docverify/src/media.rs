use std::fmt;

use crate::error::{DocVerifyError, Result};

const OCTET_STREAM: &str = "application/octet-stream";

/// Media types accepted for verification: any image plus PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentMediaType {
    Jpeg,
    Png,
    Webp,
    /// Any other `image/*` subtype. The OCR provider decides whether it can read it.
    OtherImage(String),
    Pdf,
}

impl DocumentMediaType {
    /// Parse a declared MIME type. Parameters (`; charset=...`) are ignored.
    pub fn parse(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "application/pdf" => Some(Self::Pdf),
            other => match other.strip_prefix("image/") {
                Some(subtype) if !subtype.is_empty() => Some(Self::OtherImage(other.to_string())),
                _ => None,
            },
        }
    }

    /// Like [`DocumentMediaType::parse`] but rejects unsupported types with a client error.
    pub fn require(mime: &str) -> Result<Self> {
        Self::parse(mime).ok_or_else(|| DocVerifyError::UnsupportedMediaType(mime.to_string()))
    }

    pub fn mime(&self) -> &str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::OtherImage(mime) => mime,
            Self::Pdf => "application/pdf",
        }
    }

    /// File extension used for the temporary copy, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Webp => ".webp",
            Self::Pdf => ".pdf",
            Self::OtherImage(_) => ".tmp",
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

impl fmt::Display for DocumentMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Work out the media type of an uploaded file.
///
/// The declared content type wins. When the client sent none (or the generic
/// `application/octet-stream`), the file name extension is consulted, then
/// the leading bytes. Returns the MIME string so the caller can report what
/// was rejected.
pub fn resolve_upload_mime(
    declared: Option<&str>,
    file_name: Option<&str>,
    bytes: &[u8],
) -> Option<String> {
    if let Some(ct) = declared.map(str::trim).filter(|ct| !ct.is_empty()) {
        if !ct.eq_ignore_ascii_case(OCTET_STREAM) {
            return Some(ct.to_string());
        }
    }

    if let Some(guess) = file_name.and_then(|name| mime_guess::from_path(name).first()) {
        return Some(guess.essence_str().to_string());
    }

    infer::get(bytes).map(|kind| kind.mime_type().to_string())
}
