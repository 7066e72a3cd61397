//! File-type detection for picking preview and edit handlers.
//!
//! A [`FileTypeResolver`] holds an ordered list of classifiers. Resolution
//! filters the list to classifiers compatible with the archive's adapter,
//! tries a cheap extension match first (no I/O), then content sniffing
//! over the stream's leading bytes, and finally falls back to a fixed
//! "binary" type. Sniffing order is significant: classifiers are tried in
//! registration order and the first positive match wins.
//!
//! The resolver is stateless and read-only; it is safe to call repeatedly
//! and concurrently.

use std::io::Read;

use crate::content::ContentStream;
use crate::Result;

/// Number of leading bytes read for content sniffing.
const SNIFF_LEN: usize = 32;

/// A resolved file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileType {
    /// Short stable identifier, e.g. `"png"`.
    pub id: &'static str,
    /// Human-readable name for UI display.
    pub display_name: &'static str,
}

/// The fallback type for content nothing recognizes.
pub const BINARY: FileType = FileType {
    id: "binary",
    display_name: "Binary data",
};

/// One content classifier in the resolver's ordered registry.
pub trait FileTypeClassifier: Send + Sync {
    /// The type this classifier resolves to.
    fn file_type(&self) -> FileType;

    /// Whether this classifier applies to archives of the given format.
    ///
    /// Defaults to compatible with every format; format-specific
    /// classifiers (e.g. a proprietary texture container) override this.
    fn supports_adapter(&self, adapter_id: &str) -> bool {
        let _ = adapter_id;
        true
    }

    /// Cheap extension match. `ext` is lowercased, without the dot.
    fn matches_extension(&self, ext: &str) -> bool;

    /// Content sniff over the stream's leading bytes.
    fn matches_content(&self, ext: &str, header: &[u8]) -> bool;
}

/// Stateless registry of classifiers with fixed resolution order.
pub struct FileTypeResolver {
    classifiers: Vec<Box<dyn FileTypeClassifier>>,
    fallback: FileType,
}

impl FileTypeResolver {
    /// Creates an empty resolver with the [`BINARY`] fallback.
    pub fn new() -> Self {
        Self {
            classifiers: Vec::new(),
            fallback: BINARY,
        }
    }

    /// Creates a resolver preloaded with the built-in classifiers, in
    /// their conventional order.
    pub fn with_defaults() -> Self {
        let mut resolver = Self::new();
        resolver.register(Box::new(PngClassifier));
        resolver.register(Box::new(JpegClassifier));
        resolver.register(Box::new(BmpClassifier));
        resolver.register(Box::new(OggClassifier));
        resolver.register(Box::new(WaveClassifier));
        resolver.register(Box::new(TextClassifier));
        resolver
    }

    /// Appends a classifier. Registration order is resolution order.
    pub fn register(&mut self, classifier: Box<dyn FileTypeClassifier>) {
        self.classifiers.push(classifier);
    }

    /// Number of registered classifiers.
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    /// Returns `true` if no classifiers are registered.
    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Extension-only resolution, for callers that must not touch content.
    pub fn resolve_extension(&self, adapter_id: &str, file_name: &str) -> Option<FileType> {
        let ext = extension_of(file_name);
        self.classifiers
            .iter()
            .filter(|c| c.supports_adapter(adapter_id))
            .find(|c| c.matches_extension(&ext))
            .map(|c| c.file_type())
    }

    /// Full resolution: extension match first, then content sniffing over
    /// `content`, else the fallback type.
    ///
    /// The stream is only opened if no extension matches.
    pub fn resolve(
        &self,
        adapter_id: &str,
        file_name: &str,
        content: &mut ContentStream,
    ) -> Result<FileType> {
        if let Some(file_type) = self.resolve_extension(adapter_id, file_name) {
            return Ok(file_type);
        }

        let ext = extension_of(file_name);
        content.seek_to_start()?;
        let mut header = [0u8; SNIFF_LEN];
        let read = read_up_to(&mut content.reader()?, &mut header)?;
        let header = &header[..read];

        for classifier in self
            .classifiers
            .iter()
            .filter(|c| c.supports_adapter(adapter_id))
        {
            if classifier.matches_content(&ext, header) {
                return Ok(classifier.file_type());
            }
        }
        Ok(self.fallback)
    }
}

impl Default for FileTypeResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// PNG images (`\x89PNG\r\n\x1a\n`).
pub struct PngClassifier;

impl FileTypeClassifier for PngClassifier {
    fn file_type(&self) -> FileType {
        FileType {
            id: "png",
            display_name: "PNG image",
        }
    }

    fn matches_extension(&self, ext: &str) -> bool {
        ext == "png"
    }

    fn matches_content(&self, _ext: &str, header: &[u8]) -> bool {
        header.starts_with(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'])
    }
}

/// JPEG images (`FF D8 FF`).
pub struct JpegClassifier;

impl FileTypeClassifier for JpegClassifier {
    fn file_type(&self) -> FileType {
        FileType {
            id: "jpeg",
            display_name: "JPEG image",
        }
    }

    fn matches_extension(&self, ext: &str) -> bool {
        ext == "jpg" || ext == "jpeg"
    }

    fn matches_content(&self, _ext: &str, header: &[u8]) -> bool {
        header.starts_with(&[0xFF, 0xD8, 0xFF])
    }
}

/// Windows bitmaps (`BM`).
pub struct BmpClassifier;

impl FileTypeClassifier for BmpClassifier {
    fn file_type(&self) -> FileType {
        FileType {
            id: "bmp",
            display_name: "Bitmap image",
        }
    }

    fn matches_extension(&self, ext: &str) -> bool {
        ext == "bmp"
    }

    fn matches_content(&self, _ext: &str, header: &[u8]) -> bool {
        // "BM" alone is too weak a signature; require the reserved words
        // at offset 6..10 to be zero as real BMP writers produce.
        header.len() >= 10 && header.starts_with(b"BM") && header[6..10] == [0, 0, 0, 0]
    }
}

/// Ogg containers (`OggS`), commonly Vorbis audio in game archives.
pub struct OggClassifier;

impl FileTypeClassifier for OggClassifier {
    fn file_type(&self) -> FileType {
        FileType {
            id: "ogg",
            display_name: "Ogg audio",
        }
    }

    fn matches_extension(&self, ext: &str) -> bool {
        ext == "ogg" || ext == "oga"
    }

    fn matches_content(&self, _ext: &str, header: &[u8]) -> bool {
        header.starts_with(b"OggS")
    }
}

/// RIFF/WAVE audio.
pub struct WaveClassifier;

impl FileTypeClassifier for WaveClassifier {
    fn file_type(&self) -> FileType {
        FileType {
            id: "wav",
            display_name: "WAVE audio",
        }
    }

    fn matches_extension(&self, ext: &str) -> bool {
        ext == "wav"
    }

    fn matches_content(&self, _ext: &str, header: &[u8]) -> bool {
        header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WAVE"
    }
}

/// Plain text: printable ASCII plus common whitespace.
///
/// Registered last among the built-ins so binary formats with readable
/// prefixes are claimed by their signatures first.
pub struct TextClassifier;

impl FileTypeClassifier for TextClassifier {
    fn file_type(&self) -> FileType {
        FileType {
            id: "text",
            display_name: "Plain text",
        }
    }

    fn matches_extension(&self, ext: &str) -> bool {
        matches!(ext, "txt" | "ini" | "cfg" | "csv" | "json" | "xml")
    }

    fn matches_content(&self, _ext: &str, header: &[u8]) -> bool {
        !header.is_empty()
            && header
                .iter()
                .all(|&b| b == b'\t' || b == b'\n' || b == b'\r' || (0x20..0x7F).contains(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(bytes: &[u8]) -> ContentStream {
        ContentStream::from_shared_bytes("test", std::sync::Arc::from(bytes.to_vec()))
    }

    #[test]
    fn test_extension_match_skips_content() {
        let resolver = FileTypeResolver::with_defaults();
        // Content is garbage; the extension alone must decide.
        let mut content = stream(&[0u8; 8]);
        let file_type = resolver.resolve("any", "shot.png", &mut content).unwrap();
        assert_eq!(file_type.id, "png");
        assert!(!content.is_open(), "extension match must not open the stream");
    }

    #[test]
    fn test_content_sniff_on_unknown_extension() {
        let resolver = FileTypeResolver::with_defaults();
        let mut png = stream(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n', 1, 2]);
        assert_eq!(resolver.resolve("any", "tex0.gfx", &mut png).unwrap().id, "png");

        let mut wave = stream(b"RIFF\x24\x00\x00\x00WAVEfmt ");
        assert_eq!(resolver.resolve("any", "voice.snd", &mut wave).unwrap().id, "wav");
    }

    #[test]
    fn test_fallback_to_binary() {
        let resolver = FileTypeResolver::with_defaults();
        let mut content = stream(&[0x00, 0x01, 0x02, 0x03]);
        let file_type = resolver.resolve("any", "blob.xyz", &mut content).unwrap();
        assert_eq!(file_type, BINARY);
    }

    #[test]
    fn test_registration_order_wins() {
        struct Greedy(&'static str);
        impl FileTypeClassifier for Greedy {
            fn file_type(&self) -> FileType {
                FileType {
                    id: self.0,
                    display_name: "greedy",
                }
            }
            fn matches_extension(&self, _ext: &str) -> bool {
                false
            }
            fn matches_content(&self, _ext: &str, _header: &[u8]) -> bool {
                true
            }
        }

        let mut resolver = FileTypeResolver::new();
        resolver.register(Box::new(Greedy("first")));
        resolver.register(Box::new(Greedy("second")));

        let mut content = stream(b"anything");
        assert_eq!(
            resolver.resolve("any", "file.xyz", &mut content).unwrap().id,
            "first"
        );
    }

    #[test]
    fn test_adapter_compatibility_filter() {
        struct OnlyFlatpak;
        impl FileTypeClassifier for OnlyFlatpak {
            fn file_type(&self) -> FileType {
                FileType {
                    id: "special",
                    display_name: "special",
                }
            }
            fn supports_adapter(&self, adapter_id: &str) -> bool {
                adapter_id == "flatpak"
            }
            fn matches_extension(&self, ext: &str) -> bool {
                ext == "spc"
            }
            fn matches_content(&self, _ext: &str, _header: &[u8]) -> bool {
                false
            }
        }

        let mut resolver = FileTypeResolver::new();
        resolver.register(Box::new(OnlyFlatpak));

        assert_eq!(
            resolver
                .resolve_extension("flatpak", "a.spc")
                .map(|t| t.id),
            Some("special")
        );
        assert_eq!(resolver.resolve_extension("other", "a.spc"), None);
    }

    #[test]
    fn test_text_sniffing() {
        let resolver = FileTypeResolver::with_defaults();
        let mut readme = stream(b"Hello, world!\r\nSecond line.");
        assert_eq!(
            resolver.resolve("any", "readme", &mut readme).unwrap().id,
            "text"
        );

        let mut binary = stream(b"Hello\x00world");
        assert_eq!(
            resolver.resolve("any", "data", &mut binary).unwrap(),
            BINARY
        );
    }

    #[test]
    fn test_empty_stream_falls_back() {
        let resolver = FileTypeResolver::with_defaults();
        let mut empty = stream(b"");
        assert_eq!(resolver.resolve("any", "empty", &mut empty).unwrap(), BINARY);
    }
}
