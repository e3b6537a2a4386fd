//! The stacked record store: an append-only binary log.
//!
//! Persisted form is the file format of §3/§6: a 64-byte file header
//! followed by `(48-byte record header, payload)` pairs until the write
//! cursor. The store never updates or deletes in place; the log is the
//! ground truth and every index is a derivative that can be rebuilt from a
//! full [`StackedRecordStore::iterate_records`] replay.

mod codec;

pub use codec::{FileHeader, RecordHeader, FILE_HEADER_SIZE, RECORD_HEADER_SIZE};

use crate::crc::crc32;
use crate::error::{Error, ErrorCode, Result};

/// Default initial backing-buffer capacity (1 MiB).
pub const DEFAULT_INITIAL_CAPACITY: usize = 1 << 20;
/// Default storage ceiling (1 GiB). `0` means unlimited.
pub const DEFAULT_MAX_SIZE: u64 = 1 << 30;

/// Numerator/denominator of the near-capacity warning threshold (80%).
const WARNING_THRESHOLD_NUM: u64 = 4;
const WARNING_THRESHOLD_DEN: u64 = 5;

/// Construction options for [`StackedRecordStore`].
pub struct StoreOptions {
    pub initial_capacity: usize,
    pub max_size: u64,
    pub on_storage_warning: Option<Box<dyn Fn(u64, u64) + Send + Sync>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_size: DEFAULT_MAX_SIZE,
            on_storage_warning: None,
        }
    }
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("initial_capacity", &self.initial_capacity)
            .field("max_size", &self.max_size)
            .field("on_storage_warning", &self.on_storage_warning.is_some())
            .finish()
    }
}

/// A decoded record together with its location in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub header: RecordHeader,
    pub offset: u64,
    pub payload: Vec<u8>,
}

/// The append-only log.
pub struct StackedRecordStore {
    buffer: Vec<u8>,
    write_offset: u64,
    sequence: u64,
    record_count: u64,
    schema_name: String,
    max_size: u64,
    warned: bool,
    on_storage_warning: Option<Box<dyn Fn(u64, u64) + Send + Sync>>,
    /// offset -> header, rebuilt on every append and on replay.
    headers: std::collections::BTreeMap<u64, RecordHeader>,
}

impl StackedRecordStore {
    /// Create an empty store, writing just the file header.
    pub fn new(schema_name: &str, options: StoreOptions) -> Self {
        let capacity = options.initial_capacity.max(FILE_HEADER_SIZE);
        let mut buffer = vec![0u8; capacity];
        let header = FileHeader::new(schema_name);
        header.encode(&mut buffer[..FILE_HEADER_SIZE]);
        StackedRecordStore {
            buffer,
            write_offset: FILE_HEADER_SIZE as u64,
            sequence: 0,
            record_count: 0,
            schema_name: header.schema_name,
            max_size: options.max_size,
            warned: false,
            on_storage_warning: options.on_storage_warning,
            headers: std::collections::BTreeMap::new(),
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    fn ensure_capacity(&mut self, additional: usize) {
        let required = self.write_offset as usize + additional;
        if required <= self.buffer.len() {
            return;
        }
        let mut new_len = self.buffer.len().max(1);
        while new_len < required {
            new_len = new_len.saturating_mul(2);
        }
        if self.max_size != 0 {
            new_len = new_len.min(self.max_size as usize).max(required.min(self.max_size as usize));
        }
        self.buffer.resize(new_len, 0);
    }

    fn maybe_warn(&mut self) {
        if self.warned || self.max_size == 0 {
            return;
        }
        if self.write_offset >= (self.max_size / WARNING_THRESHOLD_DEN) * WARNING_THRESHOLD_NUM {
            self.warned = true;
            log::warn!(
                "stacked record store at {} of {} bytes (80% threshold)",
                self.write_offset,
                self.max_size
            );
            if let Some(cb) = &self.on_storage_warning {
                cb(self.write_offset, self.max_size);
            }
        }
    }

    /// Whether the store's projected growth is within 80% of `max_size`.
    /// Always `false` when `max_size == 0` (unlimited, §9 open question).
    pub fn is_near_capacity(&self) -> bool {
        if self.max_size == 0 {
            return false;
        }
        self.write_offset >= (self.max_size / WARNING_THRESHOLD_DEN) * WARNING_THRESHOLD_NUM
    }

    /// Append a record for `table_name` carrying `payload`. Returns the
    /// offset of the record's header (the record's identity for index
    /// entries and later reads).
    pub fn append(&mut self, table_name: &str, payload: &[u8]) -> Result<u64> {
        let total_size = RECORD_HEADER_SIZE + payload.len();
        if self.max_size != 0 && self.write_offset + total_size as u64 > self.max_size {
            return Err(Error::with_message(
                ErrorCode::StorageLimit,
                format!(
                    "append of {} bytes would exceed max_size {}",
                    total_size, self.max_size
                ),
            ));
        }

        let offset = self.write_offset;
        let sequence = self.sequence;
        let header = RecordHeader {
            sequence,
            table_name: table_name.to_string(),
            timestamp: now_millis(),
            data_length: payload.len() as u32,
            checksum: crc32(payload),
        };

        self.ensure_capacity(total_size);
        let start = offset as usize;
        header.encode(&mut self.buffer[start..start + RECORD_HEADER_SIZE]);
        self.buffer[start + RECORD_HEADER_SIZE..start + total_size].copy_from_slice(payload);

        self.write_offset += total_size as u64;
        self.sequence += 1;
        self.record_count += 1;
        FileHeader::patch_record_count(&mut self.buffer[..FILE_HEADER_SIZE], self.record_count);
        self.headers.insert(offset, header);

        self.maybe_warn();
        Ok(offset)
    }

    /// Decode and checksum-verify the record at `offset`.
    pub fn read_record(&self, offset: u64) -> Result<StoredRecord> {
        let start = offset as usize;
        let buf = self
            .buffer
            .get(start..)
            .ok_or_else(|| Error::new(ErrorCode::ChecksumMismatch))?;
        let header = RecordHeader::decode(buf)?;
        let payload_start = start + RECORD_HEADER_SIZE;
        let payload_end = payload_start + header.data_length as usize;
        let payload = self
            .buffer
            .get(payload_start..payload_end)
            .ok_or_else(|| Error::new(ErrorCode::ChecksumMismatch))?
            .to_vec();
        if crc32(&payload) != header.checksum {
            return Err(Error::with_message(
                ErrorCode::ChecksumMismatch,
                format!("checksum mismatch for record at offset {}", offset),
            ));
        }
        Ok(StoredRecord {
            header,
            offset,
            payload,
        })
    }

    /// A restartable, best-effort iterator over every record in the log.
    /// Stops silently (does not panic or return an error) the moment a
    /// record fails to decode or checksum, per §4.1's replay tolerance.
    pub fn iterate_records(&self) -> RecordIter<'_> {
        RecordIter {
            store: self,
            cursor: FILE_HEADER_SIZE as u64,
        }
    }

    /// Filter of [`Self::iterate_records`] by table name.
    pub fn iterate_table_records<'a>(
        &'a self,
        table_name: &'a str,
    ) -> impl Iterator<Item = StoredRecord> + 'a {
        self.iterate_records()
            .filter(move |r| r.header.table_name == table_name)
    }

    /// The live, persistable bytes `[0, write_offset)`. A copy, not a view
    /// into the internal buffer (§5: callers never hold a slice that could
    /// be invalidated by later growth).
    pub fn get_data(&self) -> Vec<u8> {
        self.buffer[..self.write_offset as usize].to_vec()
    }

    /// Rebuild a store from previously exported bytes, replaying every
    /// record to restore `sequence`, `record_count`, and the offset index.
    /// Replay stops at the first record that fails to decode, treating a
    /// truncated tail as end-of-log rather than corruption.
    pub fn from_data(bytes: &[u8], options: StoreOptions) -> Result<Self> {
        let file_header = FileHeader::decode(bytes)?;
        let mut store = StackedRecordStore {
            buffer: bytes.to_vec(),
            write_offset: FILE_HEADER_SIZE as u64,
            sequence: 0,
            record_count: 0,
            schema_name: file_header.schema_name,
            max_size: options.max_size,
            warned: false,
            on_storage_warning: options.on_storage_warning,
            headers: std::collections::BTreeMap::new(),
        };

        let mut cursor = FILE_HEADER_SIZE as u64;
        let mut max_sequence_seen: Option<u64> = None;
        let mut replayed = 0u64;
        while let Ok(record) = store.read_record(cursor) {
            let advance = RECORD_HEADER_SIZE as u64 + record.header.data_length as u64;
            max_sequence_seen = Some(
                max_sequence_seen
                    .map(|m| m.max(record.header.sequence))
                    .unwrap_or(record.header.sequence),
            );
            store.headers.insert(cursor, record.header);
            cursor += advance;
            replayed += 1;
        }

        store.write_offset = cursor;
        store.record_count = replayed;
        store.sequence = max_sequence_seen.map(|m| m + 1).unwrap_or(0);
        FileHeader::patch_record_count(&mut store.buffer[..FILE_HEADER_SIZE], replayed);
        log::debug!(
            "replayed {} records from {} bytes, stopped at offset {}",
            replayed,
            bytes.len(),
            cursor
        );

        Ok(store)
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Iterator returned by [`StackedRecordStore::iterate_records`].
pub struct RecordIter<'a> {
    store: &'a StackedRecordStore,
    cursor: u64,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = StoredRecord;

    fn next(&mut self) -> Option<StoredRecord> {
        if self.cursor >= self.store.write_offset {
            return None;
        }
        match self.store.read_record(self.cursor) {
            Ok(record) => {
                self.cursor += RECORD_HEADER_SIZE as u64 + record.header.data_length as u64;
                Some(record)
            }
            Err(_) => {
                log::warn!(
                    "record iteration stopped early at offset {} (checksum or decode failure)",
                    self.cursor
                );
                self.cursor = self.store.write_offset;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_store() -> StackedRecordStore {
        StackedRecordStore::new("s", StoreOptions::default())
    }

    #[test]
    fn log_round_trip() {
        let mut store = new_store();
        let off1 = store.append("t1", &[1, 2, 3, 4, 5]).unwrap();
        let off2 = store.append("t1", &[6, 7, 8, 9, 10]).unwrap();
        assert_ne!(off1, off2);
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.read_record(off1).unwrap().payload, vec![1, 2, 3, 4, 5]);

        let data = store.get_data();
        let restored = StackedRecordStore::from_data(&data, StoreOptions::default()).unwrap();
        assert_eq!(restored.record_count(), 2);
        assert_eq!(restored.schema_name(), "s");
    }

    #[test]
    fn crc_detects_corruption() {
        let mut store = new_store();
        let offset = store.append("t", &[1, 2, 3]).unwrap();
        // Flip one byte in the payload region.
        let payload_start = offset as usize + RECORD_HEADER_SIZE;
        store.buffer[payload_start] ^= 0xFF;

        let err = store.read_record(offset).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ChecksumMismatch);

        let records: Vec<_> = store.iterate_records().collect();
        assert!(records.is_empty());
    }

    #[test]
    fn table_name_is_truncated_not_corrupted() {
        let mut store = new_store();
        let long_name = "a_very_long_table_name_indeed";
        let offset = store.append(long_name, b"x").unwrap();
        let record = store.read_record(offset).unwrap();
        assert_eq!(record.header.table_name.len(), 15);
    }

    #[test]
    fn storage_limit_rejects_overflow() {
        let mut store = StackedRecordStore::new(
            "s",
            StoreOptions {
                initial_capacity: 128,
                max_size: 128,
                on_storage_warning: None,
            },
        );
        let err = store.append("t", &[0u8; 200]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StorageLimit);
    }

    #[test]
    fn storage_warning_fires_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let mut store = StackedRecordStore::new(
            "s",
            StoreOptions {
                initial_capacity: 128,
                max_size: 200,
                on_storage_warning: Some(Box::new(move |_, _| {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                })),
            },
        );
        store.append("t", &[0u8; 100]).unwrap();
        store.append("t", &[0u8; 10]).ok();
        assert!(fired.load(Ordering::SeqCst) <= 1);
    }

    #[test]
    fn near_capacity_is_always_false_when_unlimited() {
        let store = StackedRecordStore::new(
            "s",
            StoreOptions {
                initial_capacity: 64,
                max_size: 0,
                on_storage_warning: None,
            },
        );
        assert!(!store.is_near_capacity());
    }

    #[test]
    fn iterate_table_records_filters() {
        let mut store = new_store();
        store.append("t1", b"a").unwrap();
        store.append("t2", b"b").unwrap();
        store.append("t1", b"c").unwrap();
        let t1: Vec<_> = store.iterate_table_records("t1").collect();
        assert_eq!(t1.len(), 2);
    }

    #[test]
    fn from_data_rejects_bad_magic() {
        let bytes = vec![0u8; FILE_HEADER_SIZE];
        let err = StackedRecordStore::from_data(&bytes, StoreOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadMagic);
    }

    #[test]
    fn from_data_tolerates_truncated_tail() {
        let mut store = new_store();
        store.append("t", b"hello").unwrap();
        store.append("t", b"world").unwrap();
        let mut data = store.get_data();
        data.truncate(data.len() - 2); // chop into the second record's payload
        let restored = StackedRecordStore::from_data(&data, StoreOptions::default()).unwrap();
        assert_eq!(restored.record_count(), 1);
    }

    #[test]
    fn sequence_resumes_after_restore() {
        let mut store = new_store();
        store.append("t", b"a").unwrap();
        store.append("t", b"b").unwrap();
        let data = store.get_data();
        let mut restored = StackedRecordStore::from_data(&data, StoreOptions::default()).unwrap();
        let offset = restored.append("t", b"c").unwrap();
        let record = restored.read_record(offset).unwrap();
        assert_eq!(record.header.sequence, 2);
    }
}
