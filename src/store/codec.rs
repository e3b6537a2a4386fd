//! Fixed-width little-endian codec for the stacked-record wire format.
//!
//! The layout (§3) is byte-stable on purpose so external tools can walk the
//! log without linking this crate: a 64-byte [`FileHeader`] followed by
//! repeated `(48-byte` [`RecordHeader`]`, payload)` pairs. Every helper here
//! bounds-checks its slice before touching it and fails with
//! [`ErrorCode::BadMagic`]-adjacent codes rather than panicking, mirroring
//! the teacher's varint codec in spirit (small free functions, explicit
//! `Result`s) even though the concrete widths differ.

use crate::error::{Error, ErrorCode, Result};

pub const FILE_HEADER_SIZE: usize = 64;
pub const RECORD_HEADER_SIZE: usize = 48;
pub const FILE_MAGIC: u32 = 0x464C_5451; // "FLTQ" read little-endian
pub const FILE_VERSION: u32 = 1;

const SCHEMA_NAME_LEN: usize = 40;
const TABLE_NAME_LEN: usize = 16;

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::new(ErrorCode::BadMagic))
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    data.get(offset..offset + 8)
        .map(|b| {
            u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })
        .ok_or_else(|| Error::new(ErrorCode::BadMagic))
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Truncate `s` to at most `max_len` bytes without splitting a UTF-8
/// code point (§9 open question: the chosen answer is "truncate on a
/// codepoint boundary").
pub fn truncate_utf8(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn encode_fixed_name(s: &str, width: usize, out: &mut [u8]) {
    debug_assert_eq!(out.len(), width);
    out.fill(0);
    let truncated = truncate_utf8(s, width - 1);
    out[..truncated.len()].copy_from_slice(truncated.as_bytes());
}

fn decode_fixed_name(bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(std::str::from_utf8(&bytes[..end])?.to_string())
}

/// The 64-byte file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub data_start_offset: u64,
    pub record_count: u64,
    pub schema_name: String,
}

impl FileHeader {
    pub fn new(schema_name: &str) -> Self {
        FileHeader {
            magic: FILE_MAGIC,
            version: FILE_VERSION,
            data_start_offset: FILE_HEADER_SIZE as u64,
            record_count: 0,
            schema_name: truncate_utf8(schema_name, SCHEMA_NAME_LEN - 1).to_string(),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= FILE_HEADER_SIZE);
        write_u32(buf, 0, self.magic);
        write_u32(buf, 4, self.version);
        write_u64(buf, 8, self.data_start_offset);
        write_u64(buf, 16, self.record_count);
        let mut name_field = [0u8; SCHEMA_NAME_LEN];
        encode_fixed_name(&self.schema_name, SCHEMA_NAME_LEN, &mut name_field);
        buf[24..24 + SCHEMA_NAME_LEN].copy_from_slice(&name_field);
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < FILE_HEADER_SIZE {
            return Err(Error::with_message(
                ErrorCode::BadMagic,
                "buffer shorter than file header",
            ));
        }
        let magic = read_u32(buf, 0)?;
        if magic != FILE_MAGIC {
            return Err(Error::new(ErrorCode::BadMagic));
        }
        let version = read_u32(buf, 4)?;
        if version != FILE_VERSION {
            return Err(Error::new(ErrorCode::UnsupportedVersion));
        }
        Ok(FileHeader {
            magic,
            version,
            data_start_offset: read_u64(buf, 8)?,
            record_count: read_u64(buf, 16)?,
            schema_name: decode_fixed_name(&buf[24..24 + SCHEMA_NAME_LEN])?,
        })
    }

    /// Patch just the `record_count` field in place within `buf`.
    pub fn patch_record_count(buf: &mut [u8], record_count: u64) {
        write_u64(buf, 16, record_count);
    }
}

/// The 48-byte per-record header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub sequence: u64,
    pub table_name: String,
    pub timestamp: u64,
    pub data_length: u32,
    pub checksum: u32,
}

impl RecordHeader {
    pub fn encode(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= RECORD_HEADER_SIZE);
        write_u64(buf, 0, self.sequence);
        let mut name_field = [0u8; TABLE_NAME_LEN];
        encode_fixed_name(&self.table_name, TABLE_NAME_LEN, &mut name_field);
        buf[8..8 + TABLE_NAME_LEN].copy_from_slice(&name_field);
        write_u64(buf, 24, self.timestamp);
        write_u32(buf, 32, self.data_length);
        write_u32(buf, 36, self.checksum);
        // bytes [40..48) are reserved and left zeroed.
        buf[40..48].fill(0);
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < RECORD_HEADER_SIZE {
            return Err(Error::with_message(
                ErrorCode::ChecksumMismatch,
                "buffer shorter than record header",
            ));
        }
        Ok(RecordHeader {
            sequence: read_u64(buf, 0)?,
            table_name: decode_fixed_name(&buf[8..8 + TABLE_NAME_LEN])?,
            timestamp: read_u64(buf, 24)?,
            data_length: read_u32(buf, 32)?,
            checksum: read_u32(buf, 36)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_codepoint_boundaries() {
        // 'é' is two bytes in UTF-8; truncating at byte 1 would split it.
        let s = "aé";
        assert_eq!(truncate_utf8(s, 2), "a");
    }

    #[test]
    fn file_header_round_trip() {
        let header = FileHeader::new("orders");
        let mut buf = [0u8; FILE_HEADER_SIZE];
        header.encode(&mut buf);
        let decoded = FileHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn file_header_rejects_bad_magic() {
        let buf = [0u8; FILE_HEADER_SIZE];
        let err = FileHeader::decode(&buf).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadMagic);
    }

    #[test]
    fn record_header_round_trip() {
        let header = RecordHeader {
            sequence: 7,
            table_name: "widgets".to_string(),
            timestamp: 123456,
            data_length: 10,
            checksum: 0xdeadbeef,
        };
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        header.encode(&mut buf);
        let decoded = RecordHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn table_name_truncates_in_place() {
        let long_name = "a".repeat(20);
        let header = RecordHeader {
            sequence: 0,
            table_name: long_name,
            timestamp: 0,
            data_length: 0,
            checksum: 0,
        };
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        header.encode(&mut buf);
        let decoded = RecordHeader::decode(&buf).unwrap();
        assert_eq!(decoded.table_name.len(), 15);
        assert_eq!(buf[8 + 15], 0);
    }
}
