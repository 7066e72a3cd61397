//! Lazily-materialized content streams for archive entries.
//!
//! A [`ContentStream`] is a handle to one entry's byte stream. The
//! underlying stream is produced by a deferred factory that is invoked at
//! most once, on first access; a handle that is dropped without ever being
//! read never opens a stream at all. This matters during browsing, where
//! most entries are listed but never previewed.
//!
//! Ownership follows the producer: archive-extracted streams are owned by
//! the handle and released with it, while staged-import streams are cursors
//! over the entry's shared byte buffer, so dropping the handle never
//! releases the staged bytes.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use crate::{Error, Result};

/// A readable, seekable byte source.
///
/// Blanket-implemented for everything that is `Read + Seek`, so files,
/// cursors, and adapter-produced readers all qualify.
pub trait ByteSource: Read + Seek {}

impl<T: Read + Seek> ByteSource for T {}

/// A writable, seekable byte sink, used as the repack output.
pub trait ByteSink: Write + Seek {}

impl<T: Write + Seek> ByteSink for T {}

/// A shared handle to the archive's underlying byte source.
///
/// The session owns the archive file exclusively; file generators hold
/// clones of this handle and lock it only for the duration of a single
/// entry read.
pub type SharedSource = Arc<Mutex<Box<dyn ByteSource + Send>>>;

/// Deferred factory producing the underlying stream on first access.
pub type StreamFactory = Box<dyn FnOnce() -> Result<Box<dyn ByteSource + Send>> + Send>;

/// Locks a [`SharedSource`], recovering from poisoning.
///
/// A poisoned lock means a previous reader panicked mid-read; the source
/// position is unspecified but callers always seek before reading.
pub fn lock_source(source: &SharedSource) -> std::sync::MutexGuard<'_, Box<dyn ByteSource + Send>> {
    source.lock().unwrap_or_else(|poisoned| {
        log::warn!("archive source mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// A lazily-materialized handle to one entry's content bytes.
///
/// The stream is created by the factory on first call to
/// [`reader`](Self::reader) and memoized; subsequent calls return the same
/// stream. [`seek_to_start`](Self::seek_to_start) on a never-opened handle
/// is a no-op, because creating a stream only to reset its position to zero
/// is wasteful and a newly produced stream is assumed to start at position
/// zero.
pub struct ContentStream {
    name: String,
    factory: Option<StreamFactory>,
    stream: Option<Box<dyn ByteSource + Send>>,
}

impl ContentStream {
    /// Creates a handle whose stream is produced by `factory` on first
    /// access. `name` is a display name used in diagnostics.
    pub fn from_factory(name: impl Into<String>, factory: StreamFactory) -> Self {
        Self {
            name: name.into(),
            factory: Some(factory),
            stream: None,
        }
    }

    /// Creates a handle over a shared staged-content buffer.
    ///
    /// The buffer stays owned by the staging entry; the same import can be
    /// read through any number of handles before a repack commits it.
    pub fn from_shared_bytes(name: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        Self::from_factory(name, Box::new(move || Ok(Box::new(io::Cursor::new(bytes)))))
    }

    /// Creates a handle that reads `len` bytes at `offset` from a shared
    /// archive source.
    ///
    /// The bytes are pulled from the source when the handle is first read,
    /// holding the source lock only for that window.
    pub fn from_source_range(
        name: impl Into<String>,
        source: SharedSource,
        offset: u64,
        len: u64,
    ) -> Self {
        Self::from_factory(
            name,
            Box::new(move || {
                let mut guard = lock_source(&source);
                guard.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; len as usize];
                guard.read_exact(&mut buf)?;
                Ok(Box::new(io::Cursor::new(buf)))
            }),
        )
    }

    /// The display name of this stream, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the underlying stream has been created.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns a reader over the underlying stream, creating it on first
    /// access.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if stream creation fails, or
    /// [`Error::Precondition`] if a previous creation attempt already
    /// failed (the factory is invoked at most once).
    pub fn reader(&mut self) -> Result<StreamReader<'_>> {
        if self.stream.is_none() {
            let factory = self.factory.take().ok_or_else(|| {
                Error::precondition(format!(
                    "content stream '{}' factory already failed",
                    self.name
                ))
            })?;
            self.stream = Some(factory()?);
        }
        // Checked or just assigned above.
        match self.stream.as_deref_mut() {
            Some(stream) => Ok(StreamReader(stream)),
            None => Err(Error::precondition(format!(
                "content stream '{}' unavailable",
                self.name
            ))),
        }
    }

    /// Rewinds the stream to its beginning.
    ///
    /// A no-op if the stream was never created: a fresh stream starts at
    /// position zero, so there is nothing to reset.
    pub fn seek_to_start(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_deref_mut() {
            stream.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    /// Reads the entire stream into a vector, from the beginning.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        self.seek_to_start()?;
        let mut buf = Vec::new();
        self.reader()?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl std::fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStream")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

/// A borrowed reader over a [`ContentStream`]'s underlying stream.
///
/// Forwards `Read` and `Seek`, so it can be handed to `std::io::copy` and
/// to adapter decode/encode primitives.
pub struct StreamReader<'a>(&'a mut (dyn ByteSource + Send));

impl std::fmt::Debug for StreamReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader").finish_non_exhaustive()
    }
}

impl Read for StreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for StreamReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}
