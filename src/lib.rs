//! # packvault
//!
//! A format-agnostic engine for browsing, editing, and repacking game
//! archive containers.
//!
//! Game archives (PAK, DAT, BIG, and countless proprietary cousins) share
//! one shape: a header indexing entries, then entry data laid out back to
//! back. This crate implements everything that shape has in common — the
//! directory tree, lazy per-entry content streams, staged imports,
//! file-type detection, preview caching, and a whole-archive repack with a
//! deterministic layout — while everything specific to one game's format
//! lives behind the [`FormatAdapter`] trait.
//!
//! ## Quick Start
//!
//! ### Browsing an Archive
//!
//! ```rust,ignore
//! use packvault::{ArchiveSession, ThumbnailCacheConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // `MyPakAdapter` implements `FormatAdapter` for one game's format.
//!     let session: ArchiveSession<MyPakAdapter, Vec<u8>> =
//!         ArchiveSession::open(MyPakAdapter, "data.pak", ThumbnailCacheConfig::default())?;
//!
//!     session
//!         .with_tree(|tree| {
//!             tree.for_each_entry(&mut |path, entry| {
//!                 println!("{}: {} bytes", path, entry.format_entry().data_size());
//!             });
//!         })
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! ### Replacing a File and Repacking
//!
//! ```rust,ignore
//! use packvault::{ArchiveSession, NoProgress, ThumbnailCacheConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session: ArchiveSession<MyPakAdapter, Vec<u8>> =
//!         ArchiveSession::open(MyPakAdapter, "data.pak", ThumbnailCacheConfig::default())?;
//!
//!     // Stage a replacement; the archive file is untouched until repack.
//!     let bytes = std::fs::read("portrait.png")?;
//!     session.stage_import("gfx/portrait.png", bytes).await?;
//!
//!     // Rewrite the archive atomically, committing the import.
//!     let result = session.repack_in_place(&mut NoProgress).await?;
//!     println!("wrote {} entries, {} bytes", result.entries_written, result.total_bytes);
//!     Ok(())
//! }
//! ```
//!
//! ### Implementing a Format
//!
//! A format adapter supplies the container parsing, entry enumeration, the
//! per-entry codec, and header serialization; see [`FormatAdapter`] for the
//! full contract. The engine never inspects the adapter's container or
//! entry types beyond the [`FormatEntry`] size/offset surface the repack
//! layout needs.
//!
//! ## Ownership Model
//!
//! Content flows through [`ContentStream`] handles that materialize their
//! underlying stream lazily, on first read. Archive-extracted streams are
//! owned by the handle; staged-import streams are cursors over the entry's
//! shared buffer, so reading a preview never consumes a pending edit.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Caller mistakes (reading an entry with
//! no content source, invalid cache sizing) surface as
//! [`Error::Precondition`]; adapter failures are wrapped with context in
//! [`Error::Adapter`]; a layout divergence during repack aborts with
//! [`Error::RepackConsistency`] before a corrupt archive can be produced.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod content;
pub mod entry;
pub mod error;
pub mod filetype;
pub mod progress;
pub mod repack;
pub mod session;
pub mod thumbnail;
pub mod tree;

pub use adapter::{DirectoryGroup, EntryRecord, FileGenerator, FormatAdapter, FormatEntry};
pub use content::{ByteSink, ByteSource, ContentStream, SharedSource, StreamFactory};
pub use entry::ArchiveEntry;
pub use error::{Error, Result};
pub use filetype::{FileType, FileTypeClassifier, FileTypeResolver, BINARY};
pub use progress::{NoProgress, ProgressReporter};
pub use repack::{repack, RepackResult};
pub use session::{ArchiveSession, RefreshOutcome};
pub use thumbnail::{ThumbnailCache, ThumbnailCacheConfig};
pub use tree::{build_tree, DirectoryNode};
