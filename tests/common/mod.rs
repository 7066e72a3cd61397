//! Shared test utilities for integration tests.
//!
//! Implements "FlatPak", a minimal store-only archive format exercising the
//! full adapter contract: a `FPAK` magic, an index of full paths with
//! offset/size/CRC records, then raw entry data back to back.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and may only use a subset of these
//! helpers.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::sync::Arc;

use packvault::{
    ByteSink, ByteSource, ContentStream, DirectoryGroup, EntryRecord, Error, FileGenerator,
    FormatAdapter, FormatEntry, Result, SharedSource,
};

pub const MAGIC: &[u8; 4] = b"FPAK";

/// Index record size past the name: offset (8) + size (8) + crc (4).
const RECORD_TAIL: u64 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatPakEntry {
    pub path: String,
    pub offset: u64,
    pub size: u64,
    pub crc: u32,
}

impl FormatEntry for FlatPakEntry {
    fn data_size(&self) -> u64 {
        self.size
    }
    fn offset(&self) -> u64 {
        self.offset
    }
    fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }
}

pub struct FlatPakContainer {
    pub entries: Vec<FlatPakEntry>,
}

pub struct FlatPakGenerator {
    source: SharedSource,
    total: usize,
}

impl FileGenerator<FlatPakEntry> for FlatPakGenerator {
    fn open(&mut self, entry: &FlatPakEntry) -> Result<ContentStream> {
        Ok(ContentStream::from_source_range(
            entry.path.clone(),
            Arc::clone(&self.source),
            entry.offset,
            entry.size,
        ))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.total)
    }
}

pub struct FlatPakAdapter;

impl FormatAdapter for FlatPakAdapter {
    type Container = FlatPakContainer;
    type Entry = FlatPakEntry;

    fn id(&self) -> &'static str {
        "flatpak"
    }

    fn load_archive(&self, reader: &mut dyn ByteSource) -> Result<FlatPakContainer> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::InvalidFormat("missing FPAK magic".into()));
        }
        let count = read_u32(reader)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name_len = read_u16(reader)? as usize;
            let mut name = vec![0u8; name_len];
            reader.read_exact(&mut name)?;
            let path = String::from_utf8(name)
                .map_err(|_| Error::InvalidFormat("entry path is not UTF-8".into()))?;
            entries.push(FlatPakEntry {
                path,
                offset: read_u64(reader)?,
                size: read_u64(reader)?,
                crc: read_u32(reader)?,
            });
        }
        Ok(FlatPakContainer { entries })
    }

    fn load_archive_data(
        &self,
        container: &FlatPakContainer,
        source: SharedSource,
        _file_name: &str,
    ) -> Result<(
        Vec<DirectoryGroup<FlatPakEntry>>,
        Box<dyn FileGenerator<FlatPakEntry>>,
    )> {
        let mut groups: Vec<DirectoryGroup<FlatPakEntry>> = Vec::new();
        for entry in &container.entries {
            let (directory, file_name) = match entry.path.rsplit_once('/') {
                Some((dir, name)) => (dir, name),
                None => ("", entry.path.as_str()),
            };
            let record = EntryRecord {
                file_name: file_name.to_string(),
                format_entry: entry.clone(),
            };
            match groups.iter_mut().find(|g| g.directory == directory) {
                Some(group) => group.entries.push(record),
                None => groups.push(DirectoryGroup {
                    directory: directory.to_string(),
                    entries: vec![record],
                }),
            }
        }
        let generator = FlatPakGenerator {
            source,
            total: container.entries.len(),
        };
        Ok((groups, Box::new(generator)))
    }

    fn decode_file(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        entry: &FlatPakEntry,
    ) -> Result<u64> {
        let mut hasher = crc32fast::Hasher::new();
        let copied = copy_hashing(input, output, &mut hasher)?;
        let crc = hasher.finalize();
        if crc != entry.crc {
            return Err(Error::InvalidFormat(format!(
                "CRC mismatch for '{}': stored {:08x}, computed {:08x}",
                entry.path, entry.crc, crc
            )));
        }
        Ok(copied)
    }

    fn encode_file(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        entry: &mut FlatPakEntry,
    ) -> Result<u64> {
        let mut hasher = crc32fast::Hasher::new();
        let written = copy_hashing(input, output, &mut hasher)?;
        entry.size = written;
        entry.crc = hasher.finalize();
        Ok(written)
    }

    fn header_size(&self, _container: &FlatPakContainer, entries: &[FlatPakEntry]) -> Result<u64> {
        Ok(8 + entries
            .iter()
            .map(|e| 2 + e.path.len() as u64 + RECORD_TAIL)
            .sum::<u64>())
    }

    fn write_header(
        &self,
        _container: &FlatPakContainer,
        output: &mut dyn ByteSink,
        entries: &[FlatPakEntry],
    ) -> Result<()> {
        output.write_all(MAGIC)?;
        output.write_all(&(entries.len() as u32).to_le_bytes())?;
        for entry in entries {
            output.write_all(&(entry.path.len() as u16).to_le_bytes())?;
            output.write_all(entry.path.as_bytes())?;
            output.write_all(&entry.offset.to_le_bytes())?;
            output.write_all(&entry.size.to_le_bytes())?;
            output.write_all(&entry.crc.to_le_bytes())?;
        }
        Ok(())
    }

    fn archive_extension(&self) -> &'static str {
        "fpak"
    }
}

fn copy_hashing(
    input: &mut dyn Read,
    output: &mut dyn Write,
    hasher: &mut crc32fast::Hasher,
) -> Result<u64> {
    let mut buf = [0u8; 8192];
    let mut copied = 0u64;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        output.write_all(&buf[..n])?;
        copied += n as u64;
    }
    Ok(copied)
}

fn read_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Serialized header size for a set of paths.
pub fn header_size_for(paths: &[&str]) -> u64 {
    8 + paths
        .iter()
        .map(|p| 2 + p.len() as u64 + RECORD_TAIL)
        .sum::<u64>()
}

/// Builds an in-memory FlatPak archive with contiguous data in the given
/// order.
pub fn build_pak(files: &[(&str, &[u8])]) -> Vec<u8> {
    let paths: Vec<&str> = files.iter().map(|(p, _)| *p).collect();
    let header = header_size_for(&paths);

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(files.len() as u32).to_le_bytes());
    let mut offset = header;
    for (path, data) in files {
        out.extend_from_slice(&(path.len() as u16).to_le_bytes());
        out.extend_from_slice(path.as_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&(data.len() as u64).to_le_bytes());
        out.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        offset += data.len() as u64;
    }
    assert_eq!(out.len() as u64, header);
    for (_, data) in files {
        out.extend_from_slice(data);
    }
    out
}

/// Parses an archive's index into `(path, offset, size)` tuples.
pub fn index_of(bytes: &[u8]) -> Vec<(String, u64, u64)> {
    let mut cursor = std::io::Cursor::new(bytes.to_vec());
    let container = FlatPakAdapter
        .load_archive(&mut cursor)
        .expect("valid archive");
    container
        .entries
        .into_iter()
        .map(|e| (e.path, e.offset, e.size))
        .collect()
}

/// Wraps archive bytes as a shared source.
pub fn shared_source(bytes: Vec<u8>) -> SharedSource {
    Arc::new(std::sync::Mutex::new(Box::new(std::io::Cursor::new(bytes))))
}
