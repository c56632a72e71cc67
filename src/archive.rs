//! Zip-container access: entry index, decompression, and the single-slot
//! container cache behind the bridge.
//!
//! A document container is an ordinary zip file; the renderer asks for
//! entries by name (`content.xml`, `styles.xml`, image parts) and receives
//! them either as escaped text safe to splice into a quoted literal, or as a
//! `data:` URI. The central directory is read once per open; entry bytes are
//! decompressed on every request and never cached.
//!
//! Container handles are cached one at a time, keyed by container identity:
//! a request naming the already-open container reuses the handle without
//! touching the directory again, and a request naming a different container
//! closes the old handle before opening the new one. The cache slot is
//! mutex-guarded so logically concurrent requests serialize on open/replace
//! instead of racing the slot.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::base64;
use crate::error::BridgeError;

const EOCD_SIG: u32 = 0x0605_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const LOCAL_SIG: u32 = 0x0403_4b50;

/// Fixed portion of the end-of-central-directory record.
const EOCD_LEN: usize = 22;
/// EOCD offset scan window: maximum comment length plus the fixed record.
const EOCD_SEARCH: u64 = 64 * 1024 + EOCD_LEN as u64;
/// Fixed portion of a central directory file header.
const CENTRAL_LEN: usize = 46;
/// Fixed portion of a local file header.
const LOCAL_LEN: usize = 30;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// Limits for container directory parsing and entry extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchiveLimits {
    /// Maximum number of entries accepted in one container.
    pub max_entries: usize,
    /// Maximum UTF-8 byte length for entry names.
    pub max_name_bytes: usize,
    /// Maximum decompressed size for any single entry.
    pub max_entry_bytes: usize,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_name_bytes: 4096,
            max_entry_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ArchiveLimits {
    /// Embedded-focused preset with smaller bounds.
    pub fn embedded() -> Self {
        Self {
            max_entries: 1024,
            max_name_bytes: 1024,
            max_entry_bytes: 8 * 1024 * 1024,
        }
    }
}

/// One entry of a container's central directory index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name, unique within one container.
    pub name: String,
    /// Compression method (stored or deflate).
    pub method: u16,
    /// CRC-32 of the uncompressed bytes.
    pub crc32: u32,
    /// Size of the stored byte stream.
    pub compressed_size: u64,
    /// Size after decompression.
    pub uncompressed_size: u64,
    /// Offset of the entry's local header from the start of the container.
    pub header_offset: u64,
}

/// An open zip container with its parsed entry index.
#[derive(Debug)]
pub struct ZipArchive {
    container: String,
    file: File,
    entries: Vec<ArchiveEntry>,
    index: BTreeMap<String, usize>,
    limits: ArchiveLimits,
}

impl ZipArchive {
    /// Open a container and read its central directory.
    pub fn open(container: &str, limits: ArchiveLimits) -> Result<Self, BridgeError> {
        let path = PathBuf::from(container_path(container));
        let open_failed = |reason: String| BridgeError::ContainerOpenFailed {
            container: container.to_string(),
            reason,
        };

        let mut file = File::open(&path).map_err(|e| open_failed(e.to_string()))?;
        let file_len = file
            .seek(SeekFrom::End(0))
            .map_err(|e| open_failed(e.to_string()))?;

        let (entry_count, cd_offset, cd_size) =
            read_eocd(&mut file, file_len).map_err(open_failed)?;
        if entry_count > limits.max_entries {
            return Err(open_failed(format!(
                "Entry count exceeds max_entries ({} > {})",
                entry_count, limits.max_entries
            )));
        }
        let entries =
            read_central_directory(&mut file, cd_offset, cd_size, entry_count, &limits)
                .map_err(open_failed)?;

        let mut index = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            // First occurrence wins for duplicate names.
            index.entry(entry.name.clone()).or_insert(i);
        }

        Ok(Self {
            container: container.to_string(),
            file,
            entries,
            index,
            limits,
        })
    }

    /// Identity string this container was opened under.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Names of all entries, in central directory order.
    pub fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Whether the index contains `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Read and decompress one entry. Entry bytes are not cached; each call
    /// re-reads and re-decompresses.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, BridgeError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| BridgeError::EntryNotFound {
                entry: name.to_string(),
                container: self.container.clone(),
            })?;
        let entry = self.entries[idx].clone();
        let io_err = |msg: String| {
            BridgeError::Io(format!(
                "entry {} in {}: {}",
                entry.name, self.container, msg
            ))
        };

        // The central directory sizes are authoritative; the local header is
        // only consulted for the variable-length field sizes, since streamed
        // writers may leave its size fields zero.
        self.file
            .seek(SeekFrom::Start(entry.header_offset))
            .map_err(|e| io_err(e.to_string()))?;
        let mut local = [0u8; LOCAL_LEN];
        self.file
            .read_exact(&mut local)
            .map_err(|e| io_err(e.to_string()))?;
        if le_u32(&local, 0) != LOCAL_SIG {
            return Err(io_err("bad local header signature".to_string()));
        }
        let name_len = u64::from(le_u16(&local, 26));
        let extra_len = u64::from(le_u16(&local, 28));
        let data_offset = entry.header_offset + LOCAL_LEN as u64 + name_len + extra_len;

        self.file
            .seek(SeekFrom::Start(data_offset))
            .map_err(|e| io_err(e.to_string()))?;
        let mut compressed = vec![0u8; entry.compressed_size as usize];
        self.file
            .read_exact(&mut compressed)
            .map_err(|e| io_err(e.to_string()))?;

        let data = match entry.method {
            METHOD_STORED => compressed,
            METHOD_DEFLATE => miniz_oxide::inflate::decompress_to_vec_with_limit(
                &compressed,
                self.limits.max_entry_bytes,
            )
            .map_err(|e| io_err(format!("inflate failed: {:?}", e)))?,
            other => {
                return Err(io_err(format!("unsupported compression method {}", other)))
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            return Err(io_err(format!(
                "size mismatch: expected {} bytes, got {}",
                entry.uncompressed_size,
                data.len()
            )));
        }
        if crc32fast::hash(&data) != entry.crc32 {
            return Err(io_err("CRC mismatch".to_string()));
        }
        Ok(data)
    }
}

/// Strip the `file://` scheme prefix from a container identity, if present.
fn container_path(container: &str) -> &str {
    container.strip_prefix("file://").unwrap_or(container)
}

/// Locate and parse the end-of-central-directory record.
///
/// Returns `(entry_count, cd_offset, cd_size)`.
fn read_eocd(file: &mut File, file_len: u64) -> Result<(usize, u64, u64), String> {
    if file_len < EOCD_LEN as u64 {
        return Err("file too small for a zip container".to_string());
    }
    let tail_len = file_len.min(EOCD_SEARCH);
    file.seek(SeekFrom::Start(file_len - tail_len))
        .map_err(|e| e.to_string())?;
    let mut tail = vec![0u8; tail_len as usize];
    file.read_exact(&mut tail).map_err(|e| e.to_string())?;

    // Scan backwards so a comment containing the magic cannot shadow the
    // real record.
    let mut pos = tail.len() - EOCD_LEN;
    loop {
        if le_u32(&tail, pos) == EOCD_SIG {
            let entry_count = usize::from(le_u16(&tail, pos + 10));
            let cd_size = u64::from(le_u32(&tail, pos + 12));
            let cd_offset = u64::from(le_u32(&tail, pos + 16));
            if cd_offset + cd_size > file_len {
                return Err("central directory extends past end of file".to_string());
            }
            return Ok((entry_count, cd_offset, cd_size));
        }
        if pos == 0 {
            return Err("end of central directory not found".to_string());
        }
        pos -= 1;
    }
}

/// Walk the central directory and build the entry list.
fn read_central_directory(
    file: &mut File,
    cd_offset: u64,
    cd_size: u64,
    entry_count: usize,
    limits: &ArchiveLimits,
) -> Result<Vec<ArchiveEntry>, String> {
    file.seek(SeekFrom::Start(cd_offset))
        .map_err(|e| e.to_string())?;
    let mut dir = vec![0u8; cd_size as usize];
    file.read_exact(&mut dir).map_err(|e| e.to_string())?;

    let mut entries = Vec::with_capacity(entry_count.min(1024));
    let mut pos = 0usize;
    for _ in 0..entry_count {
        if pos + CENTRAL_LEN > dir.len() {
            return Err("truncated central directory".to_string());
        }
        if le_u32(&dir, pos) != CENTRAL_SIG {
            return Err("bad central directory signature".to_string());
        }
        let method = le_u16(&dir, pos + 10);
        let crc32 = le_u32(&dir, pos + 16);
        let compressed_size = u64::from(le_u32(&dir, pos + 20));
        let uncompressed_size = u64::from(le_u32(&dir, pos + 24));
        let name_len = usize::from(le_u16(&dir, pos + 28));
        let extra_len = usize::from(le_u16(&dir, pos + 30));
        let comment_len = usize::from(le_u16(&dir, pos + 32));
        let header_offset = u64::from(le_u32(&dir, pos + 42));

        if name_len > limits.max_name_bytes {
            return Err(format!(
                "Entry name exceeds max_name_bytes ({} > {})",
                name_len, limits.max_name_bytes
            ));
        }
        // Bound both sizes: the compressed size drives the read allocation
        // and a deflate stream never usefully exceeds its output size.
        if uncompressed_size.max(compressed_size) > limits.max_entry_bytes as u64 {
            return Err(format!(
                "Entry exceeds max_entry_bytes ({} > {})",
                uncompressed_size.max(compressed_size),
                limits.max_entry_bytes
            ));
        }
        let name_end = pos + CENTRAL_LEN + name_len;
        if name_end > dir.len() {
            return Err("truncated central directory entry name".to_string());
        }
        let name = String::from_utf8_lossy(&dir[pos + CENTRAL_LEN..name_end]).into_owned();

        entries.push(ArchiveEntry {
            name,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            header_offset,
        });
        pos = name_end + extra_len + comment_len;
    }
    Ok(entries)
}

fn le_u16(buf: &[u8], pos: usize) -> u16 {
    u16::from(buf[pos]) | (u16::from(buf[pos + 1]) << 8)
}

fn le_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from(buf[pos])
        | (u32::from(buf[pos + 1]) << 8)
        | (u32::from(buf[pos + 2]) << 16)
        | (u32::from(buf[pos + 3]) << 24)
}

/// Single-slot cache of the most recently opened container.
///
/// Holds at most one [`ZipArchive`], keyed by container identity. The slot is
/// explicit injected state (not a process-wide global) and mutation is
/// serialized by a mutex.
#[derive(Debug, Default)]
pub struct ContainerCache {
    limits: ArchiveLimits,
    slot: Mutex<Option<ZipArchive>>,
    opens: AtomicU64,
}

impl ContainerCache {
    /// Create an empty cache with the given limits.
    pub fn new(limits: ArchiveLimits) -> Self {
        Self {
            limits,
            slot: Mutex::new(None),
            opens: AtomicU64::new(0),
        }
    }

    /// Number of container opens performed so far. A request for the cached
    /// identity does not increment this.
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }

    /// Run `f` against the container named by `container`, opening it if it
    /// is not the cached one. Opening a different container closes the
    /// previous handle first.
    pub fn with_archive<R>(
        &self,
        container: &str,
        f: impl FnOnce(&mut ZipArchive) -> Result<R, BridgeError>,
    ) -> Result<R, BridgeError> {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let cached = slot
            .as_ref()
            .is_some_and(|archive| archive.container() == container);
        if !cached {
            // Drop the old handle before opening the new container.
            *slot = None;
            let archive = ZipArchive::open(container, self.limits)?;
            self.opens.fetch_add(1, Ordering::Relaxed);
            *slot = Some(archive);
        }
        match slot.as_mut() {
            Some(archive) => f(archive),
            // Unreachable: the slot was just filled above.
            None => Err(BridgeError::ContainerOpenFailed {
                container: container.to_string(),
                reason: "cache slot empty".to_string(),
            }),
        }
    }
}

/// Entry-level read operations over a [`ContainerCache`].
#[derive(Debug, Default)]
pub struct ArchiveReader {
    cache: ContainerCache,
}

impl ArchiveReader {
    /// Create a reader over its own cache.
    pub fn new(cache: ContainerCache) -> Self {
        Self { cache }
    }

    /// The underlying cache (test observability and shared configuration).
    pub fn cache(&self) -> &ContainerCache {
        &self.cache
    }

    /// Read an entry as text safe to splice into a quoted string literal:
    /// CR and LF are stripped and `"` becomes `\"`.
    ///
    /// The newline stripping is destructive and only suitable for text or
    /// markup entries whose line structure does not matter to the caller.
    pub fn read_entry_as_text(
        &self,
        container: &str,
        entry: &str,
    ) -> Result<String, BridgeError> {
        let data = self
            .cache
            .with_archive(container, |archive| archive.read_entry(entry))?;
        Ok(escape_for_quoted_literal(&data))
    }

    /// Read an entry as a `data:` URI with the entry bytes base64-encoded.
    /// The MIME type is spliced in verbatim and omitted when absent.
    pub fn read_entry_as_data_uri(
        &self,
        container: &str,
        entry: &str,
        mime_type: Option<&str>,
    ) -> Result<String, BridgeError> {
        let data = self
            .cache
            .with_archive(container, |archive| archive.read_entry(entry))?;
        let mut uri = String::with_capacity(data.len() / 3 * 4 + 32);
        uri.push_str("data:");
        if let Some(mime) = mime_type {
            uri.push_str(mime);
        }
        uri.push_str(";base64,");
        uri.push_str(&base64::encode(&data));
        Ok(uri)
    }

    /// Names of all entries in the container.
    pub fn entry_names(&self, container: &str) -> Result<Vec<String>, BridgeError> {
        self.cache
            .with_archive(container, |archive| Ok(archive.entry_names()))
    }

    /// Whether the container has an entry with this name.
    pub fn contains(&self, container: &str, entry: &str) -> Result<bool, BridgeError> {
        self.cache
            .with_archive(container, |archive| Ok(archive.contains(entry)))
    }
}

/// Decode entry bytes as UTF-8 (lossy), drop CR/LF, and escape double quotes.
fn escape_for_quoted_literal(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\r' | '\n' => {}
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}
