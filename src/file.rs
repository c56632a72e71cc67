//! Random-access chunked reads of the document file bound to the renderer.
//!
//! The embedded renderer has no filesystem access; it asks the bridge for
//! `(offset, length)` windows of the document it was launched with. Reads are
//! independent: every call reopens the file and seeks, so there is no shared
//! position to corrupt and calls are reentrant-safe by construction.
//!
//! Two text encodings are exposed for the payload:
//!
//! - *Binary text*: each byte becomes the codepoint of one character. This is
//!   lossy for anything outside Latin-1 and is preserved deliberately; the
//!   renderer's runtime decodes it with the inverse byte-as-codepoint mapping
//!   and existing callers depend on the exact mapping.
//! - *Base64*: the same bytes through [`crate::base64`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::base64;
use crate::error::BridgeError;

/// A document file opened for windowed reads.
///
/// The size is captured once at open time and reported to the renderer before
/// any read is issued; the file is assumed not to change underneath an open
/// session.
#[derive(Clone, Debug)]
pub struct DocumentFile {
    path: PathBuf,
    size: u64,
}

impl DocumentFile {
    /// Bind a document by path, capturing its byte length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)
            .map_err(|e| BridgeError::from_io(&e, &path.display().to_string()))?;
        if !meta.is_file() {
            return Err(BridgeError::NotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            size: meta.len(),
        })
    }

    /// Byte length captured at open time.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Path this document was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read up to `length` bytes starting at `offset`.
    ///
    /// A window past end of file yields fewer bytes (possibly zero) with no
    /// error; callers must check the returned count. A count mismatch is
    /// reported as a diagnostic, not a failure — end of file and a truncated
    /// read are indistinguishable here, matching the legacy contract.
    pub fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>, BridgeError> {
        let display = self.path.display().to_string();
        let mut file =
            File::open(&self.path).map_err(|e| BridgeError::from_io(&e, &display))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| BridgeError::from_io(&e, &display))?;
        let mut data = Vec::with_capacity(length.min(1 << 20));
        file.take(length as u64)
            .read_to_end(&mut data)
            .map_err(|e| BridgeError::from_io(&e, &display))?;
        if data.len() != length {
            log::warn!(
                "short read from {}: requested {} bytes at offset {}, got {}",
                display,
                length,
                offset,
                data.len()
            );
        }
        Ok(data)
    }

    /// Read a window as legacy binary text (one byte per character).
    pub fn read_range_as_text(&self, offset: u64, length: usize) -> Result<String, BridgeError> {
        let data = self.read_range(offset, length)?;
        Ok(bytes_to_binary_text(&data))
    }

    /// Read a window and base64-encode it.
    pub fn read_range_as_base64(&self, offset: u64, length: usize) -> Result<String, BridgeError> {
        let data = self.read_range(offset, length)?;
        Ok(base64::encode(&data))
    }
}

/// Map bytes to a string where each byte is its own codepoint (Latin-1 view).
pub fn bytes_to_binary_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Write binary text back to disk, keeping the low byte of each character.
///
/// The inverse of the byte-as-codepoint read encoding: the renderer hands the
/// bridge a string whose characters carry one byte each, and anything above
/// `U+00FF` is truncated to its low byte. Used by the renderer's save path.
pub fn write_binary_text<P: AsRef<Path>>(path: P, data: &str) -> Result<(), BridgeError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let bytes: Vec<u8> = data.chars().map(|c| (c as u32 & 0xff) as u8).collect();
    let mut file = File::create(path).map_err(|e| BridgeError::from_io(&e, &display))?;
    file.write_all(&bytes)
        .map_err(|e| BridgeError::from_io(&e, &display))?;
    Ok(())
}
