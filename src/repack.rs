//! Whole-archive rewrite with deterministic entry layout.
//!
//! Repacking rewrites the entire archive: header first (in reserve), then
//! every entry's data laid out back to back. The pipeline runs in strict
//! phases:
//!
//! 1. finalize per-entry metadata (staged imports are encoded to a sink so
//!    sizes and checksums are correct before any offset is assigned) and
//!    register every entry in a write plan;
//! 2. compute the serialized header size for the finalized entry array;
//! 3. assign offsets sequentially from the end of the header reserve;
//! 4. verify the plan covers every entry;
//! 5. drain the plan in registration order, writing each entry's data at
//!    its assigned offset;
//! 6. seek back and serialize the header over the reserve.
//!
//! Data is written in exactly the order offsets were assigned, so entry
//! data is contiguous and offsets strictly increase (zero-length entries
//! aside). Any mismatch between planned and written bytes aborts with
//! [`Error::RepackConsistency`] rather than producing a silently corrupt
//! archive.

use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::adapter::{FileGenerator, FormatAdapter, FormatEntry};
use crate::content::ByteSink;
use crate::entry::ArchiveEntry;
use crate::progress::ProgressReporter;
use crate::{Error, Result};

/// Statistics from a completed repack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepackResult {
    /// Total number of entries written.
    pub entries_written: usize,
    /// Entries whose staged import bytes were encoded fresh.
    pub entries_fresh: usize,
    /// Entries whose stored bytes were copied verbatim.
    pub entries_copied: usize,
    /// Serialized header size in bytes.
    pub header_size: u64,
    /// Total entry data bytes written after the header.
    pub content_bytes: u64,
    /// Final archive size: header plus content.
    pub total_bytes: u64,
}

/// One planned write, queued during metadata finalization.
struct PlannedWrite {
    index: usize,
    path: String,
    fresh: bool,
}

/// FIFO queue of planned writes.
///
/// Entries are registered in traversal order and drained in the same
/// order, which is also the order offsets were assigned in, so the
/// copy phase cannot reorder or interleave entry data.
struct WritePlan {
    queue: VecDeque<PlannedWrite>,
}

impl WritePlan {
    fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    fn register(&mut self, index: usize, path: String, fresh: bool) {
        self.queue.push_back(PlannedWrite { index, path, fresh });
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn next(&mut self) -> Option<PlannedWrite> {
        self.queue.pop_front()
    }
}

/// Rewrites the archive into `output`.
///
/// `entries` is the full entry set in layout order; `generator` supplies
/// stored bytes for unmodified entries and may be `None` only when every
/// entry carries staged content. The output is assumed empty and positioned
/// anywhere; the function seeks absolutely.
///
/// Cancellation is polled once, before any byte is written; a cancelled
/// repack fails with [`Error::Cancelled`] and the output is untouched.
///
/// # Errors
///
/// - [`Error::Cancelled`] if the reporter requested cancellation.
/// - [`Error::Precondition`] if an unmodified entry has no generator.
/// - [`Error::RepackConsistency`] if written byte counts diverge from the
///   finalized metadata, or the serialized header overruns its reserve.
/// - Any adapter or I/O error, propagated.
pub fn repack<A, W>(
    adapter: &A,
    container: &A::Container,
    entries: &[&ArchiveEntry<A::Entry>],
    mut generator: Option<&mut dyn FileGenerator<A::Entry>>,
    output: &mut W,
    progress: &mut dyn ProgressReporter,
) -> Result<RepackResult>
where
    A: FormatAdapter,
    W: ByteSink,
{
    if progress.should_cancel() {
        log::info!("repack cancelled before writing started");
        return Err(Error::Cancelled);
    }
    progress.on_total(entries.len());

    let separator = adapter.path_separator();

    // Phase 1: finalize metadata and build the write plan. Staged imports
    // are encoded into a sink so their size and checksum fields reflect
    // the fresh bytes before the header size or any offset depends on them.
    let mut plan = WritePlan::new(entries.len());
    let mut finalized: Vec<A::Entry> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let mut format_entry = entry.format_entry().clone();
        let fresh = match entry.pending() {
            Some(bytes) => {
                let mut reader = io::Cursor::new(Arc::clone(bytes));
                adapter
                    .encode_file(&mut reader, &mut io::sink(), &mut format_entry)
                    .map_err(|e| {
                        Error::adapter(
                            format!("finalizing metadata for '{}'", entry.file_name()),
                            e,
                        )
                    })?;
                true
            }
            None => false,
        };
        plan.register(index, entry.full_path(separator), fresh);
        finalized.push(format_entry);
    }

    // Phase 2: the header is serialized for the finalized entry array, so
    // its size is exact before any data byte lands.
    let header_size = adapter.header_size(container, &finalized)?;

    // Phase 3: sequential offset assignment from the end of the reserve.
    let mut cursor = header_size;
    for format_entry in &mut finalized {
        format_entry.set_offset(cursor);
        cursor += format_entry.data_size();
    }

    // Phase 4: every entry must be planned exactly once.
    if plan.len() != entries.len() {
        return Err(Error::repack_consistency(format!(
            "write plan covers {} of {} entries",
            plan.len(),
            entries.len()
        )));
    }

    // Phase 5: drain the plan in registration order.
    output.seek(SeekFrom::Start(header_size))?;
    let mut entries_fresh = 0usize;
    let mut entries_copied = 0usize;
    let mut content_bytes = 0u64;
    while let Some(planned) = plan.next() {
        let entry = entries[planned.index];
        let expected = finalized[planned.index].data_size();
        progress.on_file_start(planned.index, &planned.path);

        let position = output.stream_position()?;
        if position != finalized[planned.index].offset() {
            return Err(Error::repack_consistency(format!(
                "'{}' planned at offset {} but output is at {}",
                planned.path,
                finalized[planned.index].offset(),
                position
            )));
        }

        let written = if planned.fresh {
            let bytes = entry.pending().ok_or_else(|| {
                Error::repack_consistency(format!(
                    "'{}' planned as fresh but has no staged content",
                    planned.path
                ))
            })?;
            let mut reader = io::Cursor::new(Arc::clone(bytes));
            adapter
                .encode_file(&mut reader, output, &mut finalized[planned.index])
                .map_err(|e| Error::adapter(format!("encoding '{}'", planned.path), e))?
        } else {
            // Stored bytes are already in their encoded form; copy them
            // verbatim through the generator, addressed by the ORIGINAL
            // metadata (old offsets).
            let generator = generator.as_deref_mut().ok_or_else(|| {
                Error::precondition(format!(
                    "entry '{}' is unmodified but no generator was supplied",
                    planned.path
                ))
            })?;
            let mut stream = adapter
                .get_file_data(generator, entry.format_entry())
                .map_err(|e| Error::adapter(format!("opening '{}'", planned.path), e))?;
            stream.seek_to_start()?;
            let reader = stream.reader()?;
            io::copy(&mut reader.take(expected), output)?
        };

        if written != expected {
            return Err(Error::repack_consistency(format!(
                "'{}' finalized at {} bytes but {} were written",
                planned.path, expected, written
            )));
        }

        if planned.fresh {
            entries_fresh += 1;
        } else {
            entries_copied += 1;
        }
        content_bytes += written;
        progress.on_file_complete(planned.index, written);
    }

    // Phase 6: serialize the header into its reserve.
    output.seek(SeekFrom::Start(0))?;
    adapter.write_header(container, output, &finalized)?;
    let header_end = output.stream_position()?;
    if header_end > header_size {
        return Err(Error::repack_consistency(format!(
            "header reserved {} bytes but serialized to {}",
            header_size, header_end
        )));
    }

    log::info!(
        "repacked {} entries ({} fresh, {} copied), {} content bytes",
        entries.len(),
        entries_fresh,
        entries_copied,
        content_bytes
    );
    Ok(RepackResult {
        entries_written: entries.len(),
        entries_fresh,
        entries_copied,
        header_size,
        content_bytes,
        total_bytes: header_size + content_bytes,
    })
}
