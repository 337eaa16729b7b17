use std::path::PathBuf;
use thiserror::Error;

use crate::types::Modality;

/// Result type for neurosel operations
pub type Result<T> = std::result::Result<T, NeuroselError>;

/// Error types for neurosel operations
#[derive(Error, Debug)]
pub enum NeuroselError {
    /// Volume directory unreadable or no candidate matched
    #[error("Catalog error in {}: {reason}", dir.display())]
    Catalog { dir: PathBuf, reason: String },

    /// A modality has no surviving candidate
    #[error("No candidate for {modality} (subject {subject}): {reason}")]
    NoCandidate {
        subject: String,
        modality: Modality,
        reason: String,
    },

    /// Volume header could not be read
    #[error("Header error in {}: {reason}", path.display())]
    Header { path: PathBuf, reason: String },

    /// Sidecar metadata present but malformed
    #[error("Sidecar error in {}: {reason}", path.display())]
    Sidecar { path: PathBuf, reason: String },

    /// Invalid configuration value
    #[error("Config error for {key}: {reason}")]
    Config { key: String, reason: String },

    /// A caller-supplied selection could not be applied
    #[error("Invalid selection for {modality}: {reason}")]
    InvalidSelection { modality: Modality, reason: String },

    /// Decision record could not be persisted
    #[error("Decision store error for subject {subject}: {reason}")]
    Store { subject: String, reason: String },

    /// Generic engine error
    #[error("Selection error: {0}")]
    SelectionError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl NeuroselError {
    /// Returns true for errors that end processing of the whole subject
    pub fn is_fatal_to_subject(&self) -> bool {
        matches!(
            self,
            NeuroselError::Catalog { .. }
                | NeuroselError::NoCandidate { .. }
                | NeuroselError::Store { .. }
        )
    }
}

// Helper conversions
impl From<String> for NeuroselError {
    fn from(s: String) -> Self {
        NeuroselError::SelectionError(s)
    }
}

impl From<&str> for NeuroselError {
    fn from(s: &str) -> Self {
        NeuroselError::SelectionError(s.to_string())
    }
}
