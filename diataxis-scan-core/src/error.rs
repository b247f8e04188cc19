//! Error taxonomy for the scan pipeline.
//!
//! Fatal variants abort a run before any file is processed. Per-file variants
//! are recorded against the file that produced them and the run carries on.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Site descriptor missing, unreadable or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Required credential for the selected provider is absent.
    #[error("auth error: {0}")]
    Auth(String),

    /// Navigation tree is malformed or references are ambiguous.
    #[error("nav error: {0}")]
    Nav(String),

    /// Clone or update of an external repository failed.
    #[error("repository sync failed for '{repo}': {message}")]
    RepoSync { repo: String, message: String },

    /// A navigation entry points at a file that cannot be read.
    #[error("missing file '{file_ref}': {message}")]
    MissingFile { file_ref: String, message: String },

    /// Provider answered with something that is not a valid classification.
    #[error("parse error: {0}")]
    Parse(String),

    /// Provider request failed.
    #[error("network error: {0}")]
    Network(String),
}

impl ScanError {
    /// Fatal errors abort the whole run; everything else is scoped to one file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::Config(_) | ScanError::Auth(_) | ScanError::Nav(_)
        )
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        ScanError::Network(e.to_string())
    }
}
