//! Streaming base64 encoder used to carry binary payloads across the bridge.
//!
//! The renderer side of the bridge can only receive text, so binary reads are
//! encoded with the standard 64-symbol alphabet (RFC 4648) plus `=` padding.
//! The encoder is incremental: bytes can arrive one at a time or in slices,
//! and a 3-byte carry buffer holds the tail of an incomplete group between
//! writes. Only encoding is provided; the renderer decodes on its side.

use crate::error::BridgeError;

/// The standard base64 symbol table.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Incremental base64 encoder with flush/close semantics.
///
/// Output is appended to a caller-supplied `String` so one encode session can
/// interleave with other text being built (e.g. a `data:` URI prefix).
///
/// Writing or closing after [`close`](Base64Encoder::close) fails with
/// [`BridgeError::StreamClosed`]. Flushing with no pending bytes is a no-op.
#[derive(Debug, Default)]
pub struct Base64Encoder {
    buffer: [u8; 3],
    pending: usize,
    closed: bool,
}

impl Base64Encoder {
    /// Create an encoder with an empty carry buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a single byte.
    pub fn write_byte(&mut self, b: u8, out: &mut String) -> Result<(), BridgeError> {
        if self.closed {
            return Err(BridgeError::StreamClosed);
        }
        self.buffer[self.pending] = b;
        self.pending += 1;
        if self.pending == self.buffer.len() {
            self.emit_group(out);
        }
        Ok(())
    }

    /// Encode a slice of bytes.
    pub fn write(&mut self, bytes: &[u8], out: &mut String) -> Result<(), BridgeError> {
        if self.closed {
            return Err(BridgeError::StreamClosed);
        }
        out.reserve(bytes.len() / 3 * 4 + 4);
        for &b in bytes {
            self.buffer[self.pending] = b;
            self.pending += 1;
            if self.pending == self.buffer.len() {
                self.emit_group(out);
            }
        }
        Ok(())
    }

    /// Emit any partial group with `=` padding. No-op when nothing is pending.
    ///
    /// A flush mid-stream ends the current group; subsequent writes start a
    /// fresh one, so flushing early produces padded, concatenated segments
    /// rather than one contiguous encoding.
    pub fn flush(&mut self, out: &mut String) -> Result<(), BridgeError> {
        if self.closed {
            return Err(BridgeError::StreamClosed);
        }
        self.emit_group(out);
        Ok(())
    }

    /// Flush the remaining bytes and mark the session finished.
    pub fn close(&mut self, out: &mut String) -> Result<(), BridgeError> {
        self.flush(out)?;
        self.closed = true;
        Ok(())
    }

    /// Encode the carry buffer (full or partial) and reset it.
    fn emit_group(&mut self, out: &mut String) {
        if self.pending == 0 {
            return;
        }
        // Missing bytes of a partial group are treated as zero; the unused
        // symbol slots become padding.
        let val = (u32::from(self.buffer[0]) << 16)
            | (u32::from(self.buffer[1]) << 8)
            | u32::from(self.buffer[2]);
        out.push(ALPHABET[(val >> 18) as usize & 0x3f] as char);
        out.push(ALPHABET[(val >> 12) as usize & 0x3f] as char);
        if self.pending > 1 {
            out.push(ALPHABET[(val >> 6) as usize & 0x3f] as char);
        } else {
            out.push('=');
        }
        if self.pending > 2 {
            out.push(ALPHABET[val as usize & 0x3f] as char);
        } else {
            out.push('=');
        }
        self.buffer = [0; 3];
        self.pending = 0;
    }
}

/// Encode a complete byte slice in one session.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() / 3 * 4 + 4);
    let mut enc = Base64Encoder::new();
    // A fresh encoder cannot be closed, so these cannot fail.
    let _ = enc.write(bytes, &mut out);
    let _ = enc.close(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal decoder for round-trip checks; padding-tolerant.
    fn decode(s: &str) -> Vec<u8> {
        let mut bits = 0u32;
        let mut nbits = 0u32;
        let mut out = Vec::with_capacity(s.len() / 4 * 3);
        for c in s.bytes() {
            if c == b'=' {
                break;
            }
            let v = ALPHABET
                .iter()
                .position(|&a| a == c)
                .expect("symbol in alphabet") as u32;
            bits = (bits << 6) | v;
            nbits += 6;
            if nbits >= 8 {
                nbits -= 8;
                out.push((bits >> nbits) as u8);
            }
        }
        out
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"foob"), "Zm9vYg==");
        assert_eq!(encode(b"fooba"), "Zm9vYmE=");
        assert_eq!(encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn test_output_length_law() {
        for n in 0..100usize {
            let data: Vec<u8> = (0..n).map(|i| (i * 31) as u8).collect();
            let encoded = encode(&data);
            assert_eq!(encoded.len(), n.div_ceil(3) * 4, "length mismatch for n={}", n);
        }
    }

    #[test]
    fn test_round_trip_all_lengths() {
        for n in 0..64usize {
            let data: Vec<u8> = (0..n).map(|i| (i * 7 + 13) as u8).collect();
            assert_eq!(decode(&encode(&data)), data, "round trip failed for n={}", n);
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_slice() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut out = String::with_capacity(64);
        let mut enc = Base64Encoder::new();
        for &b in data.iter() {
            enc.write_byte(b, &mut out).unwrap();
        }
        enc.close(&mut out).unwrap();
        assert_eq!(out, encode(data));
    }

    #[test]
    fn test_all_byte_values() {
        let data: Vec<u8> = (0u8..=255).collect();
        assert_eq!(decode(&encode(&data)), data);
    }

    #[test]
    fn test_flush_with_empty_buffer_is_noop() {
        let mut out = String::with_capacity(8);
        let mut enc = Base64Encoder::new();
        enc.flush(&mut out).unwrap();
        assert!(out.is_empty());
        enc.write(b"abc", &mut out).unwrap();
        enc.flush(&mut out).unwrap();
        enc.flush(&mut out).unwrap();
        assert_eq!(out, "YWJj");
    }

    #[test]
    fn test_flush_mid_stream_pads_segment() {
        let mut out = String::with_capacity(16);
        let mut enc = Base64Encoder::new();
        enc.write(b"a", &mut out).unwrap();
        enc.flush(&mut out).unwrap();
        enc.write(b"b", &mut out).unwrap();
        enc.close(&mut out).unwrap();
        // Two padded single-byte segments, not one contiguous encoding.
        assert_eq!(out, "YQ==Yg==");
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut out = String::with_capacity(8);
        let mut enc = Base64Encoder::new();
        enc.write(b"x", &mut out).unwrap();
        enc.close(&mut out).unwrap();
        assert_eq!(enc.write_byte(b'y', &mut out), Err(BridgeError::StreamClosed));
        assert_eq!(enc.write(b"yz", &mut out), Err(BridgeError::StreamClosed));
    }

    #[test]
    fn test_double_close_fails() {
        let mut out = String::with_capacity(8);
        let mut enc = Base64Encoder::new();
        enc.close(&mut out).unwrap();
        assert_eq!(enc.close(&mut out), Err(BridgeError::StreamClosed));
    }
}
