//! Per-file archive entries and the staged-edit state machine.
//!
//! An [`ArchiveEntry`] records one packed file's identity, the adapter's
//! opaque metadata for it, and at most one staged replacement buffer. An
//! entry's authoritative content is exactly one of:
//!
//! - the unread archive bytes, reachable through a [`FileGenerator`], or
//! - the staged replacement buffer attached by an import.
//!
//! Entries are created in bulk when the directory tree is built and
//! discarded wholesale when the tree is rebuilt after a successful repack.

use std::sync::Arc;

use crate::adapter::{FileGenerator, FormatEntry};
use crate::content::ContentStream;
use crate::filetype::{FileType, FileTypeResolver};
use crate::{Error, Result};

/// One packed file: identity, format metadata, and pending-edit state.
#[derive(Debug, Clone)]
pub struct ArchiveEntry<E> {
    file_name: String,
    directory: String,
    format_entry: E,
    pending: Option<Arc<[u8]>>,
    epoch: u64,
}

impl<E: FormatEntry> ArchiveEntry<E> {
    /// Creates an entry from its identity and format metadata.
    ///
    /// `directory` is the relative directory path, empty for the archive
    /// root. `epoch` identifies the tree build this entry belongs to; the
    /// thumbnail cache compares it to detect stale slots after a rebuild.
    pub fn new(
        file_name: impl Into<String>,
        directory: impl Into<String>,
        format_entry: E,
        epoch: u64,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            directory: directory.into(),
            format_entry,
            pending: None,
            epoch,
        }
    }

    /// The file name, without any directory component.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The relative directory path. Empty means the archive root.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// The tree-build epoch this entry was created in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The adapter's metadata for this entry.
    pub fn format_entry(&self) -> &E {
        &self.format_entry
    }

    /// Mutable access to the adapter's metadata.
    pub fn format_entry_mut(&mut self) -> &mut E {
        &mut self.format_entry
    }

    /// The full archive path, joining directory and file name with the
    /// format's separator.
    pub fn full_path(&self, separator: char) -> String {
        if self.directory.is_empty() {
            self.file_name.clone()
        } else {
            format!("{}{}{}", self.directory, separator, self.file_name)
        }
    }

    /// The lowercased file extension, without the dot. Empty if none.
    pub fn extension(&self) -> String {
        match self.file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => String::new(),
        }
    }

    /// Returns `true` if a replacement buffer is staged on this entry.
    ///
    /// Modified entries are included in the next repack with their fresh
    /// bytes instead of the original archive bytes.
    pub fn is_modified(&self) -> bool {
        self.pending.is_some()
    }

    /// The staged replacement buffer, if any.
    pub fn pending(&self) -> Option<&Arc<[u8]>> {
        self.pending.as_ref()
    }

    /// Stages a replacement buffer, releasing any previously staged one.
    ///
    /// Ownership of the buffer transfers to the entry; content handles
    /// opened over it share the buffer and never release it.
    pub fn stage_content(&mut self, bytes: impl Into<Arc<[u8]>>) {
        if self.pending.is_some() {
            log::debug!(
                "replacing staged content for '{}' in '{}'",
                self.file_name,
                self.directory
            );
        }
        self.pending = Some(bytes.into());
    }

    /// Discards the staged replacement buffer, reverting the entry to its
    /// original archive bytes.
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Opens this entry's authoritative content.
    ///
    /// If a replacement buffer is staged, the returned stream reads from it
    /// (the buffer stays owned by the entry). Otherwise the entry's stored
    /// bytes are pulled through `generator`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] when no content is staged and no
    /// generator was supplied; that is a programming error in the caller,
    /// not a recoverable I/O failure.
    pub fn content(
        &self,
        generator: Option<&mut dyn FileGenerator<E>>,
    ) -> Result<ContentStream> {
        if let Some(pending) = &self.pending {
            return Ok(ContentStream::from_shared_bytes(
                self.file_name.clone(),
                Arc::clone(pending),
            ));
        }
        let generator = generator.ok_or_else(|| {
            Error::precondition(format!(
                "entry '{}' has no staged content and no generator was supplied",
                self.file_name
            ))
        })?;
        generator.open(&self.format_entry)
    }

    /// Resolves this entry's file type through `resolver`, sniffing
    /// `content` only if the extension is inconclusive.
    pub fn resolve_file_type(
        &self,
        resolver: &FileTypeResolver,
        adapter_id: &str,
        content: &mut ContentStream,
    ) -> Result<FileType> {
        resolver.resolve(adapter_id, &self.file_name, content)
    }
}
