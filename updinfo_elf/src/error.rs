use std::io;
use std::path::PathBuf;

use updinfo_types::ParseError;

/// Failures while pulling a section out of an ELF file.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("cannot open {}: {source}", .path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not an ELF file: {reason}", .path.display())]
    NotAnElfFile { path: PathBuf, reason: String },
    #[error("ELF missing {0} section")]
    SectionMissing(String),
    #[error("unable to read {section} section: {reason}")]
    SectionUnreadable { section: String, reason: String },
    #[error("no null terminator in update information")]
    NoTerminator,
    #[error("no update information found")]
    EmptyPayload,
    #[error("update information is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

impl ExtractError {
    /// True when the file simply is not an ELF binary.
    pub fn is_not_elf(&self) -> bool {
        matches!(self, ExtractError::NotAnElfFile { .. })
    }
}

/// Error of [`crate::read_and_parse`].
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
