//! Constant database (cdb) construction and lookup
//!
//! This module is the database build collaborator used by the build pipeline.
//! It exposes exactly four build operations:
//!
//! - [`CdbMake::start`]: begin a build against a writable, seekable file handle
//! - [`CdbMake::add`]: add a record, failing with [`CdbError::DuplicateKey`] if the key exists
//! - [`CdbMake::put`]: add a record, replacing any earlier record with the same key
//! - [`CdbMake::finish`]: write the hash tables and header, sealing the file
//!
//! A small in-memory reader, [`Cdb`], is provided to inspect finished files.
//!
//! ## File Format
//!
//! ```text
//! [HEADER: 256 x (table_pos u32, table_slots u32)]   2048 bytes
//! [RECORDS: (key_len u32, value_len u32, key, value)*]
//! [HASH TABLES: 256 x table_slots x (hash u32, record_pos u32)]
//! ```
//!
//! All integers are little-endian. A record's table is selected by the low
//! eight bits of its hash and its starting slot by the remaining bits; collisions
//! are resolved by linear probing. Each table has twice as many slots as records.
//! The whole file must fit in 4 GiB.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;
use tracing::trace;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: u32 = 2048;

const TABLE_COUNT: usize = 256;
const RECORD_HEADER: u64 = 8;
const COPY_CHUNK: u64 = 64 * 1024;

/// Errors produced by the cdb collaborator
#[derive(Debug, Error)]
pub enum CdbError {
    /// I/O errors on the underlying file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// `add` was called with a key that is already present
    #[error("key already exists")]
    DuplicateKey,

    /// The database would exceed the 4 GiB format limit
    #[error("database exceeds the 4 GiB cdb size limit")]
    Overflow,

    /// A finished file failed structural checks while reading
    #[error("corrupt database: {0}")]
    Corrupt(String),
}

/// Result of a [`CdbMake::put`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key was not present before
    Inserted,
    /// An earlier record with the same key was removed
    Replaced,
}

/// The cdb hash function (djb's `h = ((h << 5) + h) ^ c`, seeded with 5381)
pub fn hash(key: &[u8]) -> u32 {
    key.iter()
        .fold(5381u32, |h, &c| (h << 5).wrapping_add(h) ^ u32::from(c))
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    hash: u32,
    pos: u32,
    len: u32,
}

/// An in-progress cdb build
///
/// Records are streamed to the file as they are submitted. Only keys and
/// record positions are held in memory until [`finish`](CdbMake::finish).
#[derive(Debug)]
pub struct CdbMake {
    file: BufWriter<File>,
    /// Next record position
    pos: u32,
    /// Live records keyed by submission sequence, which is also file order
    slots: BTreeMap<u64, Slot>,
    /// Key to submission sequence
    keys: HashMap<Vec<u8>, u64>,
    next_seq: u64,
}

impl CdbMake {
    /// Start a build against `file`
    ///
    /// The file must be opened for reading and writing; `put` moves record
    /// data in place when it replaces a key.
    pub fn start(mut file: File) -> Result<Self, CdbError> {
        file.seek(SeekFrom::Start(u64::from(HEADER_SIZE)))?;
        Ok(Self {
            file: BufWriter::new(file),
            pos: HEADER_SIZE,
            slots: BTreeMap::new(),
            keys: HashMap::new(),
            next_seq: 0,
        })
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no records have been submitted
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Add a record unless its key is already present
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<(), CdbError> {
        if self.keys.contains_key(key) {
            return Err(CdbError::DuplicateKey);
        }
        let slot = self.write_record(key, value)?;
        self.insert_slot(key, slot);
        Ok(())
    }

    /// Add a record, removing any earlier record with the same key
    ///
    /// The replacement is appended after all existing records, so the file
    /// never contains more than one record per key. Every record written
    /// after the replaced one is moved down to close the gap, so a replace
    /// costs time proportional to the data behind it.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<PutOutcome, CdbError> {
        let outcome = match self.keys.remove(key) {
            Some(seq) => {
                if let Some(old) = self.slots.remove(&seq) {
                    self.remove_record(old)?;
                }
                PutOutcome::Replaced
            }
            None => PutOutcome::Inserted,
        };
        let slot = self.write_record(key, value)?;
        self.insert_slot(key, slot);
        Ok(outcome)
    }

    /// Write the hash tables and header
    ///
    /// Returns the underlying file so the caller can sync and close it.
    pub fn finish(mut self) -> Result<File, CdbError> {
        let table_bytes = 16u64 * self.slots.len() as u64;
        let end = u64::from(self.pos) + table_bytes;
        if end > u64::from(u32::MAX) {
            return Err(CdbError::Overflow);
        }

        let mut buckets: Vec<Vec<Slot>> = vec![Vec::new(); TABLE_COUNT];
        for slot in self.slots.values() {
            buckets[(slot.hash & 0xff) as usize].push(*slot);
        }

        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        let mut pos = self.pos;
        for bucket in &buckets {
            let slots = bucket.len() * 2;
            header.extend_from_slice(&pos.to_le_bytes());
            header.extend_from_slice(&(slots as u32).to_le_bytes());

            let mut table = vec![(0u32, 0u32); slots];
            for slot in bucket {
                let mut i = (slot.hash >> 8) as usize % slots;
                while table[i].1 != 0 {
                    i = (i + 1) % slots;
                }
                table[i] = (slot.hash, slot.pos);
            }
            for (hash, record_pos) in table {
                self.file.write_all(&hash.to_le_bytes())?;
                self.file.write_all(&record_pos.to_le_bytes())?;
            }
            pos += (slots * 8) as u32;
        }

        let mut file = self.file.into_inner().map_err(|e| e.into_error())?;
        file.set_len(u64::from(pos))?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.flush()?;
        trace!("sealed cdb with {} records, {} bytes", self.slots.len(), pos);
        Ok(file)
    }

    fn insert_slot(&mut self, key: &[u8], slot: Slot) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(seq, slot);
        self.keys.insert(key.to_vec(), seq);
    }

    fn write_record(&mut self, key: &[u8], value: &[u8]) -> Result<Slot, CdbError> {
        let key_len = u32::try_from(key.len()).map_err(|_| CdbError::Overflow)?;
        let value_len = u32::try_from(value.len()).map_err(|_| CdbError::Overflow)?;
        let len = RECORD_HEADER + u64::from(key_len) + u64::from(value_len);
        let end = u64::from(self.pos) + len;
        if end > u64::from(u32::MAX) {
            return Err(CdbError::Overflow);
        }

        self.file.write_all(&key_len.to_le_bytes())?;
        self.file.write_all(&value_len.to_le_bytes())?;
        self.file.write_all(key)?;
        self.file.write_all(value)?;

        let slot = Slot {
            hash: hash(key),
            pos: self.pos,
            len: len as u32,
        };
        self.pos = end as u32;
        Ok(slot)
    }

    /// Close the gap left by `old` by moving every later record down
    fn remove_record(&mut self, old: Slot) -> Result<(), CdbError> {
        self.file.flush()?;
        let file = self.file.get_mut();

        let start = u64::from(old.pos);
        let end = start + u64::from(old.len);
        let tail = u64::from(self.pos) - end;
        let mut buf = vec![0u8; COPY_CHUNK.min(tail) as usize];
        let mut moved = 0u64;
        while moved < tail {
            let n = (tail - moved).min(buf.len() as u64) as usize;
            file.seek(SeekFrom::Start(end + moved))?;
            file.read_exact(&mut buf[..n])?;
            file.seek(SeekFrom::Start(start + moved))?;
            file.write_all(&buf[..n])?;
            moved += n as u64;
        }

        self.pos -= old.len;
        file.seek(SeekFrom::Start(u64::from(self.pos)))?;
        for slot in self.slots.values_mut() {
            if slot.pos > old.pos {
                slot.pos -= old.len;
            }
        }
        Ok(())
    }
}

/// A finished cdb loaded into memory
#[derive(Debug, Clone)]
pub struct Cdb {
    data: Vec<u8>,
}

impl Cdb {
    /// Load and validate a cdb file
    pub fn open(path: &Path) -> Result<Self, CdbError> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Validate an in-memory cdb image
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, CdbError> {
        if data.len() < HEADER_SIZE as usize {
            return Err(CdbError::Corrupt(format!(
                "file is {} bytes, shorter than the header",
                data.len()
            )));
        }
        let cdb = Self { data };
        for table in 0..TABLE_COUNT {
            let (pos, slots) = cdb.table(table)?;
            let end = u64::from(pos) + u64::from(slots) * 8;
            if end > cdb.data.len() as u64 {
                return Err(CdbError::Corrupt(format!("hash table {} out of bounds", table)));
            }
        }
        Ok(cdb)
    }

    /// Look up the first record stored under `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>, CdbError> {
        let h = hash(key);
        let (table_pos, slots) = self.table((h & 0xff) as usize)?;
        if slots == 0 {
            return Ok(None);
        }
        let start = (h >> 8) % slots;
        for probe in 0..slots {
            let slot_pos = table_pos + ((start + probe) % slots) * 8;
            let slot_hash = self.u32_at(slot_pos)?;
            let record_pos = self.u32_at(slot_pos + 4)?;
            if record_pos == 0 {
                return Ok(None);
            }
            if slot_hash == h {
                let (record_key, value) = self.record(record_pos)?;
                if record_key == key {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// Iterate over records in file order
    pub fn iter(&self) -> CdbIter<'_> {
        let end = self.table(0).map(|(pos, _)| pos).unwrap_or(HEADER_SIZE);
        CdbIter {
            cdb: self,
            pos: HEADER_SIZE,
            end,
        }
    }

    /// Number of records in the file
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check if the file holds no records
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    fn table(&self, index: usize) -> Result<(u32, u32), CdbError> {
        let offset = (index * 8) as u32;
        Ok((self.u32_at(offset)?, self.u32_at(offset + 4)?))
    }

    fn record(&self, pos: u32) -> Result<(&[u8], &[u8]), CdbError> {
        let key_len = self.u32_at(pos)? as usize;
        let value_len = self.u32_at(pos + 4)? as usize;
        let key_start = pos as usize + RECORD_HEADER as usize;
        let value_start = key_start + key_len;
        let value_end = value_start + value_len;
        if value_end > self.data.len() {
            return Err(CdbError::Corrupt(format!("record at {} out of bounds", pos)));
        }
        Ok((
            &self.data[key_start..value_start],
            &self.data[value_start..value_end],
        ))
    }

    fn u32_at(&self, pos: u32) -> Result<u32, CdbError> {
        let pos = pos as usize;
        self.data
            .get(pos..pos + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| CdbError::Corrupt(format!("read past end at {}", pos)))
    }
}

/// Iterator over the records of a [`Cdb`] in file order
#[derive(Debug)]
pub struct CdbIter<'a> {
    cdb: &'a Cdb,
    pos: u32,
    end: u32,
}

impl<'a> Iterator for CdbIter<'a> {
    type Item = Result<(&'a [u8], &'a [u8]), CdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        match self.cdb.record(self.pos) {
            Ok((key, value)) => {
                self.pos += (RECORD_HEADER as usize + key.len() + value.len()) as u32;
                Some(Ok((key, value)))
            }
            Err(e) => {
                self.pos = self.end;
                Some(Err(e))
            }
        }
    }
}
