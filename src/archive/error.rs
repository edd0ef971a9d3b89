//! Error types for archive packaging.

use thiserror::Error;

/// Errors that can occur while finalizing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The ZIP writer rejected an entry or failed to finish.
    #[error("failed to write ZIP entry {entry}: {source}")]
    Zip {
        /// Archive path of the entry being written (empty when finishing).
        entry: String,
        /// The underlying ZIP error.
        #[source]
        source: zip::result::ZipError,
    },

    /// Writing entry bytes into the in-memory buffer failed.
    #[error("failed to write bytes of {entry}: {source}")]
    Io {
        /// Archive path of the entry being written.
        entry: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// Creates a ZIP writer error.
    pub fn zip(entry: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            entry: entry.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(entry: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            entry: entry.into(),
            source,
        }
    }
}
