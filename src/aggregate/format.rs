//! Byte-level encode/decode for the Aggregate-Store binary container. No
//! business logic lives here — [`super::writer`] and [`super::reader`] are
//! the only callers.

use crate::constants::{AGGREGATE_MAGIC, AGGREGATE_VERSION};
use crate::error::Error;

pub const HEADER_LEN: usize = 16;
pub const BUCKET_LEN: usize = 4 + 4 + 4 + 4 + 4 + 4 + 4;

/// Smallest possible `RecordEntry` on the wire: `test_id` (16) +
/// `name_ref` (4) + `testsuite_ref` (4) + `flags_count` (2, zero flags) +
/// `updated_at` (8) + `avg_duration` (8) + `last_duration` (8) +
/// `buckets_count` (2, zero buckets). Used to sanity-check a record count
/// read from an untrusted header before using it as an allocation hint.
pub const MIN_RECORD_LEN: usize = 16 + 4 + 4 + 2 + 8 + 8 + 8 + 2;

pub struct Header {
    pub window_days: u8,
    pub num_records: u32,
    pub strings_off: u32,
}

pub fn write_header(out: &mut Vec<u8>, header: &Header) {
    out.extend_from_slice(&AGGREGATE_MAGIC);
    out.push(AGGREGATE_VERSION);
    out.push(header.window_days);
    out.extend_from_slice(&[0u8; 2]);
    out.extend_from_slice(&header.num_records.to_le_bytes());
    out.extend_from_slice(&header.strings_off.to_le_bytes());
}

pub fn read_header(bytes: &[u8]) -> Result<Header, Error> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::CorruptAggregate("buffer shorter than header".into()));
    }
    if bytes[0..4] != AGGREGATE_MAGIC {
        return Err(Error::CorruptAggregate("bad magic".into()));
    }
    let version = bytes[4];
    if version != AGGREGATE_VERSION {
        return Err(Error::CorruptAggregate(format!("unknown version {version}")));
    }
    let window_days = bytes[5];
    let num_records = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let strings_off = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
    Ok(Header {
        window_days,
        num_records,
        strings_off,
    })
}

/// Appends `s`, u32-length-prefixed, to the strings table buffer and
/// returns its byte offset within that buffer.
pub fn intern_string(table: &mut Vec<u8>, s: &str) -> u32 {
    let offset = table.len() as u32;
    let bytes = s.as_bytes();
    table.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    table.extend_from_slice(bytes);
    offset
}

pub fn read_string_at(table: &[u8], offset: u32) -> Result<String, Error> {
    let offset = offset as usize;
    if offset + 4 > table.len() {
        return Err(Error::CorruptAggregate("string offset out of bounds".into()));
    }
    let len = u32::from_le_bytes(table[offset..offset + 4].try_into().unwrap()) as usize;
    let start = offset + 4;
    let end = start
        .checked_add(len)
        .ok_or_else(|| Error::CorruptAggregate("string length overflow".into()))?;
    if end > table.len() {
        return Err(Error::CorruptAggregate("string extends past table".into()));
    }
    String::from_utf8(table[start..end].to_vec())
        .map_err(|_| Error::CorruptAggregate("string table is not valid utf-8".into()))
}

/// Appends `commit`, u16-length-prefixed, to the commits table and returns
/// its `(offset, len)`.
pub fn append_commit(table: &mut Vec<u8>, commit: &str) -> (u32, u32) {
    let offset = table.len() as u32;
    let bytes = commit.as_bytes();
    table.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    table.extend_from_slice(bytes);
    (offset, table.len() as u32 - offset)
}

/// Reads every length-prefixed commit hash in `table[off..off+len]`.
pub fn read_commits_at(table: &[u8], off: u32, len: u32) -> Result<Vec<String>, Error> {
    let end = (off as usize)
        .checked_add(len as usize)
        .ok_or_else(|| Error::CorruptAggregate("commit region overflow".into()))?;
    if end > table.len() {
        return Err(Error::CorruptAggregate("commit region out of bounds".into()));
    }
    let mut commits = Vec::new();
    let mut cursor = off as usize;
    while cursor < end {
        if cursor + 2 > table.len() {
            return Err(Error::CorruptAggregate("truncated commit length".into()));
        }
        let clen = u16::from_le_bytes(table[cursor..cursor + 2].try_into().unwrap()) as usize;
        cursor += 2;
        if cursor + clen > table.len() {
            return Err(Error::CorruptAggregate("truncated commit hash".into()));
        }
        let commit = String::from_utf8(table[cursor..cursor + clen].to_vec())
            .map_err(|_| Error::CorruptAggregate("commit hash is not valid utf-8".into()))?;
        commits.push(commit);
        cursor += clen;
    }
    Ok(commits)
}
