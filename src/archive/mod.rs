//! In-memory archive accumulator.
//!
//! The tree walker writes into an [`ArchiveBuilder`] while it downloads:
//! directories become folders, files become named entries. Once the walk is
//! complete the contents are taken out and written as a single ZIP blob.
//!
//! # Example
//!
//! ```
//! use coursezip_core::archive::ArchiveBuilder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = ArchiveBuilder::new();
//! let course = builder.folder(&builder.root(), "Analisi I");
//! builder.insert_file(&course, "lezione-01.pdf", b"%PDF-1.7".to_vec());
//!
//! let archive = builder.take().write_zip("Analisi I")?;
//! assert_eq!(archive.file_name(), "Analisi I.zip");
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::ArchiveError;

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Write};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name used when a remote name sanitizes to nothing.
const UNNAMED_ENTRY: &str = "unnamed";

/// Handle to a folder inside the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderPath(Vec<String>);

impl FolderPath {
    /// Path of a child folder.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(sanitize_entry_name(name));
        Self(segments)
    }

    /// Slash-joined path, empty for the archive root.
    #[must_use]
    pub fn as_path(&self) -> String {
        self.0.join("/")
    }

    fn entry(&self, name: &str) -> String {
        let name = sanitize_entry_name(name);
        if self.0.is_empty() {
            name
        } else {
            format!("{}/{name}", self.as_path())
        }
    }
}

/// Contents collected during a run, detached from the builder.
#[derive(Debug, Default)]
pub struct ArchiveTree {
    folders: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl ArchiveTree {
    /// Number of file entries.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Archive paths of all file entries, sorted.
    #[must_use]
    pub fn file_paths(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    /// File paths that are also folder paths. Such files are left out of
    /// the ZIP.
    #[must_use]
    pub fn name_conflicts(&self) -> Vec<&str> {
        self.files
            .keys()
            .filter(|path| self.folders.contains(path.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Bytes stored under an archive path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Writes the tree as a deflated ZIP blob.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] when the ZIP writer fails.
    pub fn write_zip(self, name: &str) -> Result<PackagedArchive, ArchiveError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(self.files.values().any(|bytes| bytes.len() >= u32::MAX as usize));
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for folder in &self.folders {
            writer
                .add_directory(format!("{folder}/"), options)
                .map_err(|e| ArchiveError::zip(folder.as_str(), e))?;
        }
        let mut written = 0;
        for (path, bytes) in &self.files {
            if self.folders.contains(path) {
                warn!(path = %path, "file has the same name as a folder; leaving it out");
                continue;
            }
            written += 1;
            writer
                .start_file(path.as_str(), options)
                .map_err(|e| ArchiveError::zip(path.as_str(), e))?;
            writer
                .write_all(bytes)
                .map_err(|e| ArchiveError::io(path.as_str(), e))?;
        }

        let bytes = writer
            .finish()
            .map_err(|e| ArchiveError::zip("", e))?
            .into_inner();
        debug!(
            files = written,
            folders = self.folders.len(),
            bytes = bytes.len(),
            "archive finalized"
        );
        Ok(PackagedArchive {
            bytes,
            name: name.to_string(),
            files: written,
        })
    }
}

/// Write-only archive accumulator owned by one run.
///
/// Concurrent traversal branches insert through `&self`; each insert holds
/// the lock only for the map update.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    tree: Mutex<ArchiveTree>,
}

impl ArchiveBuilder {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the archive root.
    #[must_use]
    pub fn root(&self) -> FolderPath {
        FolderPath::default()
    }

    /// Creates (or reuses) a sub-folder and returns its handle.
    pub fn folder(&self, parent: &FolderPath, name: &str) -> FolderPath {
        let folder = parent.child(name);
        let path = folder.as_path();
        let mut tree = self.lock();
        if tree.files.contains_key(&path) {
            warn!(path = %path, "folder has the same name as a file");
        }
        tree.folders.insert(path);
        folder
    }

    /// Adds a file entry under `folder`.
    ///
    /// Returns true when the name collides with an earlier file (which is
    /// replaced) or with a folder (which wins when the ZIP is written).
    pub fn insert_file(&self, folder: &FolderPath, name: &str, bytes: Vec<u8>) -> bool {
        let path = folder.entry(name);
        let mut tree = self.lock();
        let shadowed = tree.folders.contains(&path);
        if shadowed {
            warn!(path = %path, "file has the same name as a folder");
        }
        let replaced = tree.files.insert(path.clone(), bytes).is_some();
        if replaced {
            warn!(path = %path, "duplicate entry name; keeping the latest download");
        }
        replaced || shadowed
    }

    /// Number of file entries inserted so far.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.lock().file_count()
    }

    /// Takes the collected contents, leaving the builder empty.
    #[must_use]
    pub fn take(&self) -> ArchiveTree {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ArchiveTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Finalized archive ready to be handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArchive {
    /// ZIP bytes.
    pub bytes: Vec<u8>,
    /// Suggested name (the root directory's name).
    pub name: String,
    /// Number of file entries in the archive.
    pub files: usize,
}

impl PackagedArchive {
    /// File name to save the archive under.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.zip", sanitize_entry_name(&self.name))
    }
}

/// Makes a remote name safe to use as a single archive path segment.
#[must_use]
pub fn sanitize_entry_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        UNNAMED_ENTRY.to_string()
    } else {
        trimmed.to_string()
    }
}
