//! External collaborator contracts: format adapters and file generators.
//!
//! The engine is format-agnostic. Everything specific to one game's
//! container layout lives behind [`FormatAdapter`]: parsing the container,
//! enumerating its entries, decoding/encoding a single entry's bytes, and
//! serializing the container header back out. The engine calls these
//! primitives and never inspects the adapter's container or entry types.
//!
//! Content is pulled lazily through a [`FileGenerator`], so browsing an
//! archive never materializes every file in memory.

use std::io::{Read, Write};

use crate::content::{ByteSink, ByteSource, ContentStream, SharedSource};
use crate::{Error, Result};

/// Per-format entry metadata, as understood by one [`FormatAdapter`].
///
/// The engine treats entries as opaque except for the three fields the
/// repack algorithm needs: the stored data size and the byte offset within
/// the archive. Everything else (checksums, encryption flags, per-format
/// attributes) stays private to the adapter.
pub trait FormatEntry: Clone + Send + 'static {
    /// The size in bytes of this entry's stored data.
    fn data_size(&self) -> u64;

    /// The byte offset of this entry's stored data within the archive.
    fn offset(&self) -> u64;

    /// Stamps a new byte offset, assigned during repack.
    fn set_offset(&mut self, offset: u64);
}

/// One file record from an adapter's flat entry listing.
#[derive(Debug, Clone)]
pub struct EntryRecord<E> {
    /// The file name, without any directory component.
    pub file_name: String,
    /// The adapter's metadata for this entry.
    pub format_entry: E,
}

/// A flat group of entries sharing one directory path.
///
/// Adapters enumerate a freshly loaded container as a list of these groups;
/// the engine builds the browsable directory tree from them. An empty
/// `directory` means the archive root.
#[derive(Debug, Clone)]
pub struct DirectoryGroup<E> {
    /// Relative directory path, using the adapter's separator. Empty = root.
    pub directory: String,
    /// The entries stored directly in this directory.
    pub entries: Vec<EntryRecord<E>>,
}

/// A pull-based provider of per-entry content streams.
///
/// Generators avoid loading an entire archive into memory: each call to
/// [`open`](Self::open) yields a lazy [`ContentStream`] for one entry's
/// stored bytes.
pub trait FileGenerator<E>: Send {
    /// Opens a content stream for the given entry.
    fn open(&mut self, entry: &E) -> Result<ContentStream>;

    /// Returns the total number of entries this generator can produce.
    ///
    /// Generators that only support random access by entry may not be able
    /// to enumerate; those fail with [`Error::NotSupported`].
    fn count(&self) -> Result<usize> {
        Err(Error::NotSupported {
            operation: "file generator enumeration",
        })
    }
}

/// A per-archive-format implementation of the container layout.
///
/// Implemented once per concrete game format and consumed by the engine.
/// The associated types keep each adapter working with its own concrete
/// container and entry metadata, without runtime casts.
pub trait FormatAdapter: Send + Sync {
    /// Opaque in-memory representation of a loaded container.
    ///
    /// Pure pass-through state: the engine hands it back unmodified to
    /// [`header_size`](Self::header_size) and
    /// [`write_header`](Self::write_header) and never inspects it.
    type Container: Send;

    /// This format's per-entry metadata type.
    type Entry: FormatEntry;

    /// A short stable identifier for this format, e.g. `"flatpak"`.
    ///
    /// Used by file-type classifiers to declare adapter compatibility.
    fn id(&self) -> &'static str;

    /// Parses the container header/index from raw archive bytes.
    fn load_archive(&self, reader: &mut dyn ByteSource) -> Result<Self::Container>;

    /// Enumerates a loaded container into flat directory groups plus a
    /// generator for pulling entry content on demand.
    ///
    /// `file_name` is the archive's own file name, available to formats
    /// that derive per-archive state (e.g. an encryption key) from it.
    fn load_archive_data(
        &self,
        container: &Self::Container,
        source: SharedSource,
        file_name: &str,
    ) -> Result<(Vec<DirectoryGroup<Self::Entry>>, Box<dyn FileGenerator<Self::Entry>>)>;

    /// Decodes one entry's stored bytes into its logical content.
    ///
    /// Returns the number of bytes written to `output`.
    fn decode_file(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        entry: &Self::Entry,
    ) -> Result<u64>;

    /// Encodes one entry's logical content into its stored form, updating
    /// the entry's on-disk metadata (size, checksum, encryption flags) as a
    /// side effect.
    ///
    /// Returns the number of bytes written to `output`. Callers that only
    /// need the metadata normalization pass `std::io::sink()` as the
    /// output, as the repack pipeline does before assigning offsets.
    fn encode_file(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        entry: &mut Self::Entry,
    ) -> Result<u64>;

    /// Opens one entry's stored bytes through a generator.
    ///
    /// The default implementation delegates to [`FileGenerator::open`];
    /// adapters with unusual addressing can override it.
    fn get_file_data(
        &self,
        generator: &mut dyn FileGenerator<Self::Entry>,
        entry: &Self::Entry,
    ) -> Result<ContentStream> {
        generator.open(entry)
    }

    /// Computes the container's serialized header size for a finalized
    /// entry array.
    ///
    /// The repack pipeline reserves this many bytes at the start of the
    /// output before laying out entry data.
    fn header_size(&self, container: &Self::Container, entries: &[Self::Entry]) -> Result<u64>;

    /// Serializes the container header and the finalized entry metadata
    /// (now carrying correct offsets, sizes, and checksums) into the
    /// reserved region at the start of the output.
    fn write_header(
        &self,
        container: &Self::Container,
        output: &mut dyn ByteSink,
        entries: &[Self::Entry],
    ) -> Result<()>;

    /// The character separating directory segments in this format's paths.
    fn path_separator(&self) -> char {
        '/'
    }

    /// Whether this format supports creating and removing directories.
    fn can_modify_directories(&self) -> bool {
        false
    }

    /// The conventional file extension of this format's archives, without
    /// the leading dot.
    fn archive_extension(&self) -> &'static str;
}
