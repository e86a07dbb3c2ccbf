//! RPM header blob parsing.
//!
//! A header blob as stored in the package database is:
//!
//! ```text
//! +---------+---------+------------------------+-------------+
//! | il: u32 | dl: u32 | il x 16-byte index     | dl bytes of |
//! |  (BE)   |  (BE)   | (tag, type, off, count)| data store  |
//! +---------+---------+------------------------+-------------+
//! ```
//!
//! All integers are big-endian. Offsets are relative to the data store.

use std::collections::HashMap;

use layercheck_core::error::{CheckError, Result};

pub const TAG_NAME: u32 = 1000;
pub const TAG_VERSION: u32 = 1001;
pub const TAG_RELEASE: u32 = 1002;
pub const TAG_EPOCH: u32 = 1003;
pub const TAG_INSTALLTIME: u32 = 1008;
pub const TAG_VENDOR: u32 = 1011;
pub const TAG_ARCH: u32 = 1022;
pub const TAG_OLDFILENAMES: u32 = 1027;
pub const TAG_FILEMODES: u32 = 1030;
pub const TAG_FILEFLAGS: u32 = 1037;
pub const TAG_DIRINDEXES: u32 = 1116;
pub const TAG_BASENAMES: u32 = 1117;
pub const TAG_DIRNAMES: u32 = 1118;

const TYPE_INT16: u32 = 3;
const TYPE_INT32: u32 = 4;
const TYPE_STRING: u32 = 6;
const TYPE_STRING_ARRAY: u32 = 8;
const TYPE_I18NSTRING: u32 = 9;

const INDEX_ENTRY_SIZE: usize = 16;
const MAX_INDEX_ENTRIES: usize = 0xffff;
const MAX_DATA_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    kind: u32,
    offset: usize,
    count: usize,
}

/// A parsed header: tag index plus its data store.
#[derive(Debug, Clone)]
pub struct Header {
    index: HashMap<u32, IndexEntry>,
    data: Vec<u8>,
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(at..at + 2)?.try_into().ok()?;
    Some(u16::from_be_bytes(raw))
}

fn malformed(message: impl Into<String>) -> CheckError {
    CheckError::PackageDb(format!("malformed rpm header: {}", message.into()))
}

impl Header {
    /// Parse a header blob (without the leading magic).
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let il = be_u32(blob, 0).ok_or_else(|| malformed("missing index length"))? as usize;
        let dl = be_u32(blob, 4).ok_or_else(|| malformed("missing data length"))? as usize;
        if il == 0 || il > MAX_INDEX_ENTRIES {
            return Err(malformed(format!("index count {} out of range", il)));
        }
        if dl > MAX_DATA_SIZE {
            return Err(malformed(format!("data length {} out of range", dl)));
        }

        let data_start = 8 + il * INDEX_ENTRY_SIZE;
        let data = blob
            .get(data_start..data_start + dl)
            .ok_or_else(|| malformed("blob shorter than declared"))?
            .to_vec();

        let mut index = HashMap::with_capacity(il);
        for i in 0..il {
            let at = 8 + i * INDEX_ENTRY_SIZE;
            let tag = be_u32(blob, at).ok_or_else(|| malformed("truncated index"))?;
            let kind = be_u32(blob, at + 4).ok_or_else(|| malformed("truncated index"))?;
            let offset = be_u32(blob, at + 8).ok_or_else(|| malformed("truncated index"))? as usize;
            let count = be_u32(blob, at + 12).ok_or_else(|| malformed("truncated index"))? as usize;
            if offset > dl {
                return Err(malformed(format!("tag {} offset {} beyond data", tag, offset)));
            }
            index.insert(tag, IndexEntry { kind, offset, count });
        }

        Ok(Self { index, data })
    }

    fn entry(&self, tag: u32, kinds: &[u32]) -> Option<IndexEntry> {
        self.index
            .get(&tag)
            .copied()
            .filter(|e| kinds.contains(&e.kind))
    }

    /// NUL-terminated strings starting at `offset`, at most `count` of them.
    fn strings_at(&self, offset: usize, count: usize) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(count.min(4096));
        let mut pos = offset;
        for _ in 0..count {
            let rest = self
                .data
                .get(pos..)
                .ok_or_else(|| malformed("string beyond data"))?;
            let len = rest
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| malformed("unterminated string"))?;
            out.push(String::from_utf8_lossy(&rest[..len]).into_owned());
            pos += len + 1;
        }
        Ok(out)
    }

    /// A single string (STRING, or the first I18NSTRING entry).
    pub fn string(&self, tag: u32) -> Result<Option<String>> {
        match self.entry(tag, &[TYPE_STRING, TYPE_I18NSTRING]) {
            Some(e) => Ok(self.strings_at(e.offset, 1)?.into_iter().next()),
            None => Ok(None),
        }
    }

    /// A string array; empty when the tag is absent.
    pub fn string_array(&self, tag: u32) -> Result<Vec<String>> {
        match self.entry(tag, &[TYPE_STRING_ARRAY, TYPE_I18NSTRING]) {
            Some(e) => self.strings_at(e.offset, e.count),
            None => Ok(Vec::new()),
        }
    }

    /// An INT32 array; empty when the tag is absent.
    pub fn u32_array(&self, tag: u32) -> Result<Vec<u32>> {
        let Some(e) = self.entry(tag, &[TYPE_INT32]) else {
            return Ok(Vec::new());
        };
        (0..e.count)
            .map(|i| be_u32(&self.data, e.offset + i * 4).ok_or_else(|| malformed("int32 beyond data")))
            .collect()
    }

    /// An INT16 array; empty when the tag is absent.
    pub fn u16_array(&self, tag: u32) -> Result<Vec<u16>> {
        let Some(e) = self.entry(tag, &[TYPE_INT16]) else {
            return Ok(Vec::new());
        };
        (0..e.count)
            .map(|i| be_u16(&self.data, e.offset + i * 2).ok_or_else(|| malformed("int16 beyond data")))
            .collect()
    }

    /// The first INT32 value of a tag.
    pub fn u32(&self, tag: u32) -> Result<Option<u32>> {
        Ok(self.u32_array(tag)?.into_iter().next())
    }
}
