//! Persistence layer for the Tally index.
//!
//! This module handles saving and loading the index to/from disk. The on-disk
//! format is designed for:
//!
//! - Versioning: newer format versions are detected and refused
//! - Atomic writes: the file is written beside the target and renamed over it
//! - Integrity: a CRC32 footer detects corruption
//!
//! ## Index File Format
//!
//! ```text
//! [Header: 16 bytes]
//!   - Magic: "TLLY" (4 bytes)
//!   - Version: u32 (4 bytes)
//!   - Flags: u32 (4 bytes) - compression
//!   - Reserved: 4 bytes
//!
//! [Body: variable, optionally LZ4 compressed]
//!   - Document count: u32
//!   - Entry count: u32
//!   - For each entry, in ascending term order:
//!     - Term length: u32, then the UTF-8 term bytes
//!     - Posting length: u32, then that many u32 document ids
//!
//! [Footer: 8 bytes]
//!   - CRC32 checksum of the body as stored: u32
//!   - Magic: "YLLT" (4 bytes)
//! ```
//!
//! All integers are little-endian.

use crate::error::{Result, TallyError};
use crate::index::Index;
use crate::types::{DocId, PostingList};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Magic bytes at the start of index files
pub const MAGIC_HEADER: &[u8; 4] = b"TLLY";
/// Magic bytes at the end of index files (reversed)
pub const MAGIC_FOOTER: &[u8; 4] = b"YLLT";
/// Current index format version
pub const INDEX_VERSION: u32 = 1;

/// Serialized header size
const HEADER_LEN: usize = 16;
/// Checksum plus footer magic
const FOOTER_LEN: usize = 8;

/// Flags for index file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFlags(u32);

impl IndexFlags {
    /// No compression
    pub const NONE: Self = IndexFlags(0);
    /// LZ4 compressed body
    pub const COMPRESSED_LZ4: Self = IndexFlags(1);

    const KNOWN: u32 = 1;

    fn is_compressed(&self) -> bool {
        self.0 & Self::COMPRESSED_LZ4.0 != 0
    }
}

/// Header structure for the index file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexHeader {
    magic: [u8; 4],
    version: u32,
    flags: u32,
    reserved: [u8; 4],
}

impl IndexHeader {
    fn new(flags: IndexFlags) -> Self {
        IndexHeader {
            magic: *MAGIC_HEADER,
            version: INDEX_VERSION,
            flags: flags.0,
            reserved: [0; 4],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.magic != *MAGIC_HEADER {
            return Err(TallyError::format("invalid magic bytes in header"));
        }
        if self.version == 0 || self.version > INDEX_VERSION {
            return Err(TallyError::UnsupportedVersion {
                found: self.version,
                expected: INDEX_VERSION,
            });
        }
        if self.flags & !IndexFlags::KNOWN != 0 {
            return Err(TallyError::format(format!(
                "unknown header flags {:#x}",
                self.flags
            )));
        }
        Ok(())
    }
}

/// Manages one index file on disk.
///
/// ## Example
///
/// ```rust,no_run
/// use tally_core::{Index, IndexFile};
///
/// let file = IndexFile::new("./data/tally.idx").with_compression(true);
///
/// let mut index = Index::new();
/// index.add_document(["hello", "world"]);
/// file.save(&index)?;
///
/// let loaded = file.load()?;
/// assert_eq!(loaded.document_count(), 1);
/// # Ok::<(), tally_core::TallyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct IndexFile {
    /// Location of the index file
    path: PathBuf,

    /// Whether to compress the body when saving
    use_compression: bool,
}

impl IndexFile {
    /// Create a handle for the index file at `path`. Nothing is touched yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        IndexFile {
            path: path.as_ref().to_path_buf(),
            use_compression: false,
        }
    }

    /// Set whether to use compression when saving.
    ///
    /// Loading always honours whatever the file header says.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.use_compression = compress;
        self
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if an index file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Sibling path written during save.
    fn temp_path(&self) -> Result<PathBuf> {
        let mut name: OsString = self
            .path
            .file_name()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} does not name a file", self.path.display()),
                )
            })?
            .to_os_string();
        name.push(".tmp");
        Ok(self.path.with_file_name(name))
    }

    /// Save the index to disk, replacing any existing file.
    ///
    /// Uses atomic write (write to temp, then rename) to prevent corruption.
    #[instrument(skip(self, index), fields(path = %self.path.display()))]
    pub fn save(&self, index: &Index) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let raw = encode_body(index)?;
        let (flags, body) = if self.use_compression {
            (IndexFlags::COMPRESSED_LZ4, lz4_flex::compress_prepend_size(&raw))
        } else {
            (IndexFlags::NONE, raw)
        };

        info!(
            documents = index.document_count(),
            terms = index.term_count(),
            bytes = body.len(),
            compressed = flags.is_compressed(),
            "Saving index to disk"
        );

        let header_bytes = bincode::serialize(&IndexHeader::new(flags))?;
        let checksum = crc32fast::hash(&body);

        let temp_path = self.temp_path()?;
        let written = write_file(&temp_path, &header_bytes, &body, checksum);
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(error = %cleanup, "Could not remove temporary index file");
            }
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            warn!(error = %e, "Failed to move index into place");
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(error = %cleanup, "Could not remove temporary index file");
            }
            return Err(e.into());
        }

        debug!("Index saved successfully");
        Ok(())
    }

    /// Load the index from disk.
    ///
    /// The whole file is validated before an `Index` is built, so a failure
    /// never yields a partially populated index.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Index> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TallyError::IndexNotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(bytes = data.len(), "Loading index from disk");

        if data.len() < HEADER_LEN + FOOTER_LEN {
            return Err(TallyError::format(format!(
                "truncated file: {} bytes is shorter than header and footer",
                data.len()
            )));
        }

        // Read and validate header
        let header: IndexHeader = bincode::deserialize(&data[..HEADER_LEN])?;
        header.validate()?;
        let flags = IndexFlags(header.flags);

        // Read and verify footer
        let (rest, footer) = data.split_at(data.len() - FOOTER_LEN);
        let body = &rest[HEADER_LEN..];

        if &footer[4..8] != MAGIC_FOOTER {
            return Err(TallyError::format("invalid footer magic bytes (truncated file?)"));
        }

        let stored_checksum = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let computed_checksum = crc32fast::hash(body);
        if stored_checksum != computed_checksum {
            return Err(TallyError::format(format!(
                "checksum mismatch: expected {:08x}, got {:08x}",
                stored_checksum, computed_checksum
            )));
        }

        let index = if flags.is_compressed() {
            let raw = lz4_flex::decompress_size_prepended(body)
                .map_err(|e| TallyError::format(format!("decompression failed: {}", e)))?;
            decode_body(&raw)?
        } else {
            decode_body(body)?
        };

        info!(
            documents = index.document_count(),
            terms = index.term_count(),
            "Index loaded successfully"
        );
        Ok(index)
    }

    /// Load the index, or return a new empty one if there is none yet.
    ///
    /// Any other failure is still reported.
    pub fn load_or_new(&self) -> Result<Index> {
        match self.load() {
            Err(TallyError::IndexNotFound { .. }) => {
                debug!(path = %self.path.display(), "No index file, starting empty");
                Ok(Index::new())
            }
            other => other,
        }
    }
}

fn write_file(path: &Path, header: &[u8], body: &[u8], checksum: u32) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(header)?;
    writer.write_all(body)?;
    writer.write_all(&checksum.to_le_bytes())?;
    writer.write_all(MAGIC_FOOTER)?;

    writer.flush()?;
    writer.get_ref().sync_all()
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Length prefix for a term, posting list or entry count.
fn len_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| TallyError::format(format!("{} too long to store: {}", what, len)))
}

/// Encode the dictionary with terms in ascending order.
fn encode_body(index: &Index) -> Result<Vec<u8>> {
    let mut entries: Vec<(&str, &PostingList)> = index.entries().collect();
    entries.sort_unstable_by_key(|(term, _)| *term);

    let size = 8 + entries
        .iter()
        .map(|(term, list)| 8 + term.len() + 4 * list.len())
        .sum::<usize>();
    let mut out = Vec::with_capacity(size);

    put_u32(&mut out, index.document_count());
    put_u32(&mut out, len_u32(entries.len(), "dictionary")?);
    for (term, list) in entries {
        put_u32(&mut out, len_u32(term.len(), "term")?);
        out.extend_from_slice(term.as_bytes());
        put_u32(&mut out, len_u32(list.len(), "posting list")?);
        for &id in list.iter() {
            put_u32(&mut out, id);
        }
    }
    Ok(out)
}

/// Bounds-checked little-endian reader over the body.
struct BodyReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> BodyReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BodyReader { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(TallyError::format(format!(
                "truncated {} at body offset {}",
                what, self.offset
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decode and validate a body into an index.
fn decode_body(body: &[u8]) -> Result<Index> {
    let mut reader = BodyReader::new(body);

    let document_count = reader.read_u32("document count")?;
    let entry_count = reader.read_u32("entry count")? as usize;

    // Each entry needs at least 9 bytes, which bounds a corrupt count
    let mut dictionary = HashMap::with_capacity(entry_count.min(reader.remaining() / 9));

    for _ in 0..entry_count {
        let term_len = reader.read_u32("term length")? as usize;
        let term_bytes = reader.take(term_len, "term")?;
        let term = std::str::from_utf8(term_bytes)
            .map_err(|e| TallyError::format(format!("term is not valid UTF-8: {}", e)))?;
        if term.is_empty() {
            return Err(TallyError::format("empty term in dictionary"));
        }

        let posting_len = reader.read_u32("posting length")? as usize;
        if posting_len > reader.remaining() / 4 {
            return Err(TallyError::format(format!(
                "truncated posting list for term {:?}",
                term
            )));
        }
        let mut ids: Vec<DocId> = Vec::with_capacity(posting_len);
        for _ in 0..posting_len {
            ids.push(reader.read_u32("posting id")?);
        }

        if ids.last().is_some_and(|&last| last >= document_count) {
            return Err(TallyError::format(format!(
                "posting for term {:?} refers to a document beyond the count {}",
                term, document_count
            )));
        }
        let list = PostingList::from_sorted(ids).ok_or_else(|| {
            TallyError::format(format!("postings for term {:?} are not strictly ascending", term))
        })?;
        if list.is_empty() {
            return Err(TallyError::format(format!("empty posting list for term {:?}", term)));
        }

        if dictionary.insert(term.to_string(), list).is_some() {
            return Err(TallyError::format(format!("duplicate term {:?}", term)));
        }
    }

    if reader.remaining() != 0 {
        return Err(TallyError::format(format!(
            "{} trailing bytes after the last entry",
            reader.remaining()
        )));
    }

    Ok(Index::from_parts(dictionary, document_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_test_index() -> Index {
        let mut index = Index::new();
        index.add_document(["president", "obama"]);
        index.add_document(["president", "biden"]);
        index.add_document(Vec::<&str>::new());
        index.add_document(["obama", "kamala"]);
        index
    }

    /// Wrap a raw body in a valid header and footer
    fn frame(body: &[u8], version: u32) -> Vec<u8> {
        let mut header = IndexHeader::new(IndexFlags::NONE);
        header.version = version;
        let mut out = bincode::serialize(&header).unwrap();
        out.extend_from_slice(body);
        out.extend_from_slice(&crc32fast::hash(body).to_le_bytes());
        out.extend_from_slice(MAGIC_FOOTER);
        out
    }

    fn body(document_count: u32, entries: &[(&str, &[DocId])]) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, document_count);
        put_u32(&mut out, entries.len() as u32);
        for (term, ids) in entries {
            put_u32(&mut out, term.len() as u32);
            out.extend_from_slice(term.as_bytes());
            put_u32(&mut out, ids.len() as u32);
            for &id in ids.iter() {
                put_u32(&mut out, id);
            }
        }
        out
    }

    fn load_bytes(bytes: &[u8]) -> Result<Index> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tally.idx");
        fs::write(&path, bytes).unwrap();
        IndexFile::new(&path).load()
    }

    #[test]
    fn test_header_size() {
        let header = bincode::serialize(&IndexHeader::new(IndexFlags::NONE)).unwrap();
        assert_eq!(header.len(), HEADER_LEN);
        assert_eq!(&header[..4], MAGIC_HEADER);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = IndexFile::new(temp_dir.path().join("tally.idx"));

        let index = make_test_index();
        file.save(&index).unwrap();
        assert!(file.exists());
        assert!(!file.temp_path().unwrap().exists());

        let loaded = file.load().unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.document_count(), 4);
    }

    #[test]
    fn test_save_and_load_compressed() {
        let temp_dir = TempDir::new().unwrap();
        let file = IndexFile::new(temp_dir.path().join("tally.idx")).with_compression(true);

        let mut index = make_test_index();
        for _ in 0..50 {
            index.add_document(["repeated", "terms", "compress", "well"]);
        }
        file.save(&index).unwrap();

        let bytes = fs::read(file.path()).unwrap();
        let header: IndexHeader = bincode::deserialize(&bytes[..HEADER_LEN]).unwrap();
        assert!(IndexFlags(header.flags).is_compressed());

        // A plain handle reads compressed files too
        let loaded = IndexFile::new(file.path()).load().unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_save_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.idx");
        let second = temp_dir.path().join("b.idx");

        let index = make_test_index();
        index.save(&first).unwrap();
        index.clone().save(&second).unwrap();
        assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
    }

    #[test]
    fn test_save_overwrites_and_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("tally.idx");

        make_test_index().save(&path).unwrap();
        Index::new().save(&path).unwrap();
        assert_eq!(Index::open(&path).unwrap(), Index::new());
    }

    #[test]
    fn test_save_to_unwritable_path() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let result = make_test_index().save(blocker.join("tally.idx"));
        assert!(matches!(result, Err(TallyError::Io(_))));
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tally.idx");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();

        let result = IndexFile::new(&path).save(&make_test_index());
        assert!(matches!(result, Err(TallyError::Io(_))));
        assert!(!temp_dir.path().join("tally.idx.tmp").exists());
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let file = IndexFile::new(temp_dir.path().join("tally.idx"));

        let result = file.load();
        assert!(matches!(result, Err(TallyError::IndexNotFound { .. })));
        assert!(file.load_or_new().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_index() {
        let result = load_bytes(b"not a valid index file");
        assert!(matches!(result, Err(TallyError::Format { .. })));

        let result = load_bytes(b"");
        assert!(matches!(result, Err(TallyError::Format { .. })));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = frame(&body(0, &[]), INDEX_VERSION);
        bytes[0] = b'X';
        assert!(matches!(load_bytes(&bytes), Err(TallyError::Format { .. })));
    }

    #[test]
    fn test_unsupported_version() {
        let bytes = frame(&body(0, &[]), INDEX_VERSION + 1);
        assert!(matches!(
            load_bytes(&bytes),
            Err(TallyError::UnsupportedVersion { found, .. }) if found == INDEX_VERSION + 1
        ));
    }

    #[test]
    fn test_truncated_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tally.idx");
        make_test_index().save(&path).unwrap();

        let bytes = fs::read(&path).unwrap();
        for len in [bytes.len() - 1, bytes.len() / 2, HEADER_LEN] {
            assert!(load_bytes(&bytes[..len]).is_err(), "length {}", len);
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = frame(&body(2, &[("a", &[0, 1])]), INDEX_VERSION);
        bytes[HEADER_LEN + 12] ^= 0xff;
        let err = load_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_truncated_body() {
        let mut raw = body(2, &[("a", &[0, 1])]);
        raw.truncate(raw.len() - 2);
        let err = load_bytes(&frame(&raw, INDEX_VERSION)).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_invalid_bodies() {
        let cases: Vec<(&str, Vec<u8>)> = vec![
            ("unsorted ids", body(3, &[("a", &[1, 0])])),
            ("duplicate ids", body(3, &[("a", &[1, 1])])),
            ("id beyond count", body(2, &[("a", &[0, 2])])),
            ("duplicate term", body(2, &[("a", &[0]), ("a", &[1])])),
            ("empty term", body(2, &[("", &[0])])),
            ("empty postings", body(2, &[("a", &[])])),
            ("trailing bytes", {
                let mut raw = body(2, &[("a", &[0])]);
                raw.push(0);
                raw
            }),
            ("bad utf-8", {
                let mut raw = body(1, &[("ab", &[0])]);
                raw[12] = 0xff;
                raw
            }),
        ];

        for (name, raw) in cases {
            let result = load_bytes(&frame(&raw, INDEX_VERSION));
            assert!(matches!(result, Err(TallyError::Format { .. })), "{}", name);
        }
    }

    #[test]
    fn test_hand_built_body_loads() {
        let raw = body(3, &[("a", &[0, 2]), ("b", &[1])]);
        let index = load_bytes(&frame(&raw, INDEX_VERSION)).unwrap();
        assert_eq!(index.document_count(), 3);
        assert_eq!(index.postings("a"), &[0, 2]);
        assert_eq!(encode_body(&index).unwrap(), raw);
    }
}
