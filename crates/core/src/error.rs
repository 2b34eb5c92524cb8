//! Error types for slide deck conversion.
//!
//! Everything in [`Error`] is fatal for a run. Conditions that only degrade a
//! single run or shape have their own small error types
//! ([`crate::types::HyperlinkError`], [`crate::picture::ImageConversionError`])
//! and are resolved where they occur.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a conversion.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read the input or write the output.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// The package is readable but its structure is not a presentation.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// The image directory does not exist and could not be created.
    #[error("Failed to create image directory '{}': {source}", path.display())]
    ImageDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An extracted picture could not be written to disk.
    #[error("Failed to write image '{}': {source}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The renderer failed to write to its output.
    #[error("Failed to write output: {0}")]
    OutputError(#[source] std::io::Error),

    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
