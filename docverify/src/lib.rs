//! Identity document verification.
//!
//! Extracts text from an uploaded image or PDF through an OCR provider and
//! checks it for a checksum-valid Brazilian CPF and the `nome` label.

pub mod api;
pub mod config;
pub mod cpf;
pub mod error;
pub mod media;
pub mod ocr;
pub mod upload;
pub mod verification;
