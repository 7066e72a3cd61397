//! One open archive: tree, content access, previews, and in-place repack.
//!
//! An [`ArchiveSession`] owns everything attached to a single archive file:
//! the adapter-parsed container, the browsable directory tree, the shared
//! byte source, the preview cache, and the file-type resolver. Structural
//! state sits behind one async mutex, so staging, reading, preview refresh,
//! and repack serialize against each other; the preview cache has its own
//! lock and can be queried concurrently.
//!
//! Preview refreshes supersede each other: starting a new refresh cancels
//! the one in flight through a fresh [`CancellationToken`], so a user
//! rapidly flipping between directories never queues stale work.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::adapter::{FileGenerator, FormatAdapter};
use crate::content::{ContentStream, SharedSource};
use crate::entry::ArchiveEntry;
use crate::filetype::{FileType, FileTypeResolver};
use crate::progress::ProgressReporter;
use crate::repack::{repack, RepackResult};
use crate::thumbnail::{ThumbnailCache, ThumbnailCacheConfig};
use crate::tree::{build_tree, DirectoryNode};
use crate::{Error, Result};

/// Counts from one preview refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Previews computed and cached by this pass.
    pub computed: usize,
    /// Entries whose preview was already cached and current.
    pub cached: usize,
    /// Entries skipped because the pass was superseded or cancelled.
    pub cancelled: usize,
    /// Entries whose preview computation failed; failures are logged and
    /// do not abort the pass.
    pub failed: usize,
}

struct SessionState<A: FormatAdapter> {
    container: A::Container,
    tree: DirectoryNode<A::Entry>,
    // Holds the archive file handle alive through its clone of the shared
    // source.
    generator: Box<dyn FileGenerator<A::Entry>>,
    epoch: u64,
}

/// An open archive with staged-edit, preview, and repack operations.
///
/// `T` is the caller's preview type (decoded image, text snippet, ...);
/// the session caches whatever the refresh closure produces.
pub struct ArchiveSession<A: FormatAdapter, T: Clone + Send + 'static> {
    adapter: A,
    path: PathBuf,
    file_name: String,
    state: tokio::sync::Mutex<SessionState<A>>,
    cache: ThumbnailCache<T>,
    resolver: FileTypeResolver,
    refresh_token: std::sync::Mutex<CancellationToken>,
}

impl<A: FormatAdapter, T: Clone + Send + 'static> ArchiveSession<A, T> {
    /// Opens the archive at `path` and builds its directory tree.
    ///
    /// The file stays open for the session's lifetime; entry content is
    /// pulled from it lazily.
    pub fn open(adapter: A, path: impl AsRef<Path>, cache_config: ThumbnailCacheConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut file = std::fs::File::open(&path)?;
        let container = adapter.load_archive(&mut file)?;
        let source: SharedSource = Arc::new(std::sync::Mutex::new(Box::new(file)));
        let (groups, generator) = adapter.load_archive_data(&container, source, &file_name)?;
        let epoch = 1;
        let tree = build_tree(&groups, adapter.path_separator(), epoch);
        log::info!(
            "opened '{}': {} entries (format '{}')",
            file_name,
            tree.entry_count(),
            adapter.id()
        );

        Ok(Self {
            adapter,
            path,
            file_name,
            state: tokio::sync::Mutex::new(SessionState {
                container,
                tree,
                generator,
                epoch,
            }),
            cache: ThumbnailCache::new(cache_config)?,
            resolver: FileTypeResolver::with_defaults(),
            refresh_token: std::sync::Mutex::new(CancellationToken::new()),
        })
    }

    /// The archive's own file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The format adapter this session was opened with.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The preview cache. Lookups go through
    /// [`ThumbnailCache::try_get`] with the current [`epoch`](Self::epoch).
    pub fn cache(&self) -> &ThumbnailCache<T> {
        &self.cache
    }

    /// The file-type resolver used for previews. Register custom
    /// classifiers here before refreshing.
    pub fn resolver_mut(&mut self) -> &mut FileTypeResolver {
        &mut self.resolver
    }

    /// The current tree-build epoch. Bumps on every reload after a repack.
    pub async fn epoch(&self) -> u64 {
        self.state.lock().await.epoch
    }

    /// Runs `f` against the current directory tree.
    pub async fn with_tree<R>(&self, f: impl FnOnce(&DirectoryNode<A::Entry>) -> R) -> R {
        let state = self.state.lock().await;
        f(&state.tree)
    }

    /// Stages `bytes` as the replacement content for the entry at `path`.
    ///
    /// The entry is marked modified and its cached preview is invalidated;
    /// the archive file itself is untouched until
    /// [`repack_in_place`](Self::repack_in_place).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if `path` names no entry.
    pub async fn stage_import(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let separator = self.adapter.path_separator();
        let mut state = self.state.lock().await;
        let entry = state
            .tree
            .find_entry_mut(path, separator)
            .ok_or_else(|| Error::EntryNotFound {
                path: path.to_string(),
            })?;
        entry.stage_content(bytes);
        self.cache.remove(path);
        Ok(())
    }

    /// Discards the staged replacement for the entry at `path`, if any.
    pub async fn discard_import(&self, path: &str) -> Result<()> {
        let separator = self.adapter.path_separator();
        let mut state = self.state.lock().await;
        let entry = state
            .tree
            .find_entry_mut(path, separator)
            .ok_or_else(|| Error::EntryNotFound {
                path: path.to_string(),
            })?;
        entry.clear_pending();
        self.cache.remove(path);
        Ok(())
    }

    /// Reads and decodes the logical content of the entry at `path`.
    ///
    /// Staged imports are returned as-is; stored entries are pulled from
    /// the archive and run through the adapter's decoder.
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let separator = self.adapter.path_separator();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let entry = state
            .tree
            .find_entry(path, separator)
            .ok_or_else(|| Error::EntryNotFound {
                path: path.to_string(),
            })?;
        decode_entry(&self.adapter, entry, state.generator.as_mut())
    }

    /// Recomputes previews for the direct entries of `directory`.
    ///
    /// Starting a refresh cancels any refresh still in flight; the
    /// superseded pass stops at its next entry boundary and reports the
    /// remainder as cancelled. Per-entry failures are logged and counted,
    /// never fatal. Previews already cached under the current epoch are
    /// not recomputed.
    ///
    /// `compute` receives the entry's full path, its resolved file type,
    /// and its decoded content.
    pub async fn refresh_previews<F>(&self, directory: &str, compute: F) -> Result<RefreshOutcome>
    where
        F: Fn(&str, &FileType, &[u8]) -> Result<T>,
    {
        let token = self.supersede_refresh();
        let separator = self.adapter.path_separator();

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let epoch = state.epoch;
        let node = state
            .tree
            .find_dir(directory, separator)
            .ok_or_else(|| Error::EntryNotFound {
                path: directory.to_string(),
            })?;

        let mut outcome = RefreshOutcome::default();
        let total = node.entries().len();
        for index in 0..total {
            if token.is_cancelled() {
                outcome.cancelled = total - index;
                log::debug!(
                    "preview refresh of '{}' superseded after {} entries",
                    directory,
                    index
                );
                break;
            }
            let entry = &node.entries()[index];
            let path = entry.full_path(separator);
            if self.cache.try_get(&path, epoch).is_some() {
                outcome.cached += 1;
                continue;
            }

            match self.compute_preview(entry, &path, state.generator.as_mut(), &compute) {
                Ok(preview) => {
                    self.cache.insert(&path, epoch, preview);
                    outcome.computed += 1;
                }
                Err(e) => {
                    log::warn!("preview for '{}' failed: {}", path, e);
                    outcome.failed += 1;
                }
            }
            tokio::task::yield_now().await;
        }
        Ok(outcome)
    }

    fn compute_preview<F>(
        &self,
        entry: &ArchiveEntry<A::Entry>,
        path: &str,
        generator: &mut dyn FileGenerator<A::Entry>,
        compute: &F,
    ) -> Result<T>
    where
        F: Fn(&str, &FileType, &[u8]) -> Result<T>,
    {
        let decoded = decode_entry(&self.adapter, entry, generator)?;
        let mut probe = ContentStream::from_shared_bytes(
            entry.file_name().to_string(),
            Arc::from(decoded.clone()),
        );
        let file_type = entry.resolve_file_type(&self.resolver, self.adapter.id(), &mut probe)?;
        compute(path, &file_type, &decoded)
    }

    /// Rewrites the archive file in place, committing all staged imports.
    ///
    /// The new archive is written to a temporary file next to the original
    /// and atomically renamed over it, so a failed or cancelled repack
    /// leaves the original file byte-for-byte intact. On success the
    /// container is reloaded, the tree rebuilt under a new epoch, and the
    /// preview cache cleared.
    pub async fn repack_in_place(
        &self,
        progress: &mut dyn ProgressReporter,
    ) -> Result<RepackResult> {
        // Previews in flight are computing against the old tree.
        self.supersede_refresh();

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        let result = {
            let entries = state.tree.collect_entries();
            repack(
                &self.adapter,
                &state.container,
                &entries,
                Some(state.generator.as_mut()),
                temp.as_file_mut(),
                progress,
            )?
        };
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        // Reload from the rewritten file under a fresh epoch.
        let mut file = std::fs::File::open(&self.path)?;
        let container = self.adapter.load_archive(&mut file)?;
        let source: SharedSource = Arc::new(std::sync::Mutex::new(Box::new(file)));
        let (groups, generator) = self
            .adapter
            .load_archive_data(&container, source, &self.file_name)?;
        let epoch = state.epoch + 1;
        state.container = container;
        state.tree = build_tree(&groups, self.adapter.path_separator(), epoch);
        state.generator = generator;
        state.epoch = epoch;
        self.cache.clear();

        log::info!(
            "repacked '{}' in place: {} entries, {} bytes",
            self.file_name,
            result.entries_written,
            result.total_bytes
        );
        Ok(result)
    }

    /// Ends the session: cancels any refresh in flight and drops the
    /// preview cache, the tree, and the archive file handle.
    ///
    /// Staged imports that were never repacked are discarded.
    pub fn close(self) {
        self.supersede_refresh();
        self.cache.clear();
        log::debug!("closed session for '{}'", self.file_name);
    }

    /// Cancels any refresh in flight and installs a fresh token for the
    /// next one.
    fn supersede_refresh(&self) -> CancellationToken {
        let mut slot = self.refresh_token.lock().unwrap_or_else(|poisoned| {
            log::warn!("refresh token mutex was poisoned, recovering");
            poisoned.into_inner()
        });
        slot.cancel();
        *slot = CancellationToken::new();
        slot.clone()
    }
}

/// Decodes one entry's logical content: staged bytes verbatim, stored
/// bytes through the adapter's decoder.
fn decode_entry<A: FormatAdapter>(
    adapter: &A,
    entry: &ArchiveEntry<A::Entry>,
    generator: &mut dyn FileGenerator<A::Entry>,
) -> Result<Vec<u8>> {
    if let Some(pending) = entry.pending() {
        return Ok(pending.to_vec());
    }
    let mut stream = adapter.get_file_data(generator, entry.format_entry())?;
    stream.seek_to_start()?;
    let mut reader = stream.reader()?;
    let mut decoded = Vec::new();
    adapter
        .decode_file(&mut reader, &mut decoded, entry.format_entry())
        .map_err(|e| Error::adapter(format!("decoding '{}'", entry.file_name()), e))?;
    Ok(decoded)
}
