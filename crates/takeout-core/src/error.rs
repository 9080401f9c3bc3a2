//! Error taxonomy for a restore run.

use std::path::PathBuf;

use thiserror::Error;

use crate::events::Severity;
use crate::exiftool::ToolError;
use crate::metadata::MetadataError;

/// Restore result type.
pub type Result<T> = std::result::Result<T, RestoreError>;

#[derive(Error, Debug)]
pub enum RestoreError {
    /// Input tree could not be walked; no jobs are started.
    #[error("Cannot read input folder {}: {source}", .root.display())]
    Discovery {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No matching JSON found for: {file}")]
    MatchNotFound { file: String },

    #[error("Unusable metadata in {}: {source}", .sidecar.display())]
    MetadataParse {
        sidecar: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error("ExifTool failed for {file}: {source}")]
    ExternalTool {
        file: String,
        #[source]
        source: ToolError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RestoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Severity this error is surfaced with in the run log.
    pub fn severity(&self) -> Severity {
        match self {
            Self::MatchNotFound { .. } | Self::MetadataParse { .. } => Severity::Warn,
            Self::ExternalTool { .. } | Self::Io { .. } => Severity::Error,
            Self::Discovery { .. } | Self::Pool(_) | Self::InvalidState(_) | Self::Config(_) => {
                Severity::Fatal
            }
        }
    }

    /// Whether this error aborts the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let soft = RestoreError::MatchNotFound {
            file: "a.jpg".into(),
        };
        assert_eq!(soft.severity(), Severity::Warn);
        assert!(!soft.is_fatal());

        let io = RestoreError::io("/out/a.jpg", std::io::Error::other("disk full"));
        assert_eq!(io.severity(), Severity::Error);

        let discovery = RestoreError::Discovery {
            root: "/missing".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(discovery.is_fatal());
        assert!(discovery.to_string().contains("/missing"));
    }
}
