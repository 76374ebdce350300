//! On-disk reflog framing.
//!
//! A reflog file is a sequence of frames:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized RefLogEntry)]
//! ```
//! Frames are only ever appended. On read, a frame whose CRC does not match
//! is skipped and a truncated trailing frame ends the log; both are the
//! leftovers of a crash mid-append. The next append cuts a torn tail off
//! before writing, so new frames always start on a frame boundary.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{RefError, Result};
use crate::file::SyncMode;
use crate::types::RefLogEntry;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Serialize one entry into a frame.
pub(crate) fn encode_frame(entry: &RefLogEntry) -> Result<Vec<u8>> {
    let payload = bincode::serialize(entry).map_err(|e| RefError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| RefError::Serialization("reflog entry too large".into()))?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Walk the complete frames in `data`, passing each frame's offset, stored
/// CRC and payload to `visit`. Returns the offset just past the last complete
/// frame; anything after it is a torn write.
fn scan_frames<'d>(data: &'d [u8], mut visit: impl FnMut(usize, u32, &'d [u8])) -> usize {
    let mut offset = 0usize;
    while offset + HEADER_SIZE <= data.len() {
        let header = &data[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let start = offset + HEADER_SIZE;
        if length == 0 || start + length > data.len() {
            break;
        }
        visit(offset, crc, &data[start..start + length]);
        offset = start + length;
    }
    offset
}

/// Decode every valid frame in `data`, oldest first.
pub(crate) fn decode_frames(name: &str, data: &[u8]) -> Vec<RefLogEntry> {
    let mut entries = Vec::new();
    let end = scan_frames(data, |offset, expected_crc, payload| {
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(name, offset, expected = expected_crc, actual = actual_crc, "reflog CRC mismatch; skipping entry");
            return;
        }
        match bincode::deserialize::<RefLogEntry>(payload) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(name, offset, error = %e, "undecodable reflog entry; skipping"),
        }
    });
    if end < data.len() {
        warn!(name, offset = end, trailing = data.len() - end, "truncated reflog frame; stopping");
    }
    entries
}

/// Read and decode the log at `path`. A missing file is an empty log.
pub(crate) fn read_log_file(name: &str, path: &Path) -> Result<Vec<RefLogEntry>> {
    match fs::read(path) {
        Ok(data) => Ok(decode_frames(name, &data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// How to undo one append.
#[derive(Debug)]
pub(crate) struct AppendUndo {
    path: std::path::PathBuf,
    /// Intact length before the append, or `None` if the file did not exist.
    previous_len: Option<u64>,
}

impl AppendUndo {
    /// Restore the file to its state before the append.
    pub(crate) fn rollback(&self) {
        let result = match self.previous_len {
            Some(len) => OpenOptions::new()
                .write(true)
                .open(&self.path)
                .and_then(|f| f.set_len(len)),
            None => fs::remove_file(&self.path),
        };
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to roll back reflog append");
        }
    }
}

/// Cut a torn trailing frame off the log at `path` so the next frame starts
/// on a frame boundary. Returns the length of the intact prefix.
fn trim_torn_tail(path: &Path, data: &[u8]) -> Result<u64> {
    let end = scan_frames(data, |_, _, _| {});
    if end < data.len() {
        warn!(path = %path.display(), offset = end, trailing = data.len() - end, "dropping torn reflog tail");
        OpenOptions::new().write(true).open(path)?.set_len(end as u64)?;
    }
    Ok(end as u64)
}

/// Append one entry to the log at `path`, creating it if needed.
///
/// A torn frame left at the end by an interrupted append is removed first;
/// rolling back restores the log to its intact prefix.
pub(crate) fn append_entry(path: &Path, entry: &RefLogEntry, sync: &SyncMode) -> Result<AppendUndo> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let previous_len = match fs::read(path) {
        Ok(data) => Some(trim_torn_tail(path, &data)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let undo = AppendUndo {
        path: path.to_path_buf(),
        previous_len,
    };

    let frame = encode_frame(entry)?;
    let mut file: File = OpenOptions::new().create(true).append(true).open(path)?;
    let written = file.write_all(&frame).and_then(|()| {
        if matches!(sync, SyncMode::EveryWrite) {
            file.sync_all()
        } else {
            Ok(())
        }
    });
    if let Err(e) = written {
        undo.rollback();
        return Err(e.into());
    }

    debug!(path = %path.display(), len = frame.len(), "reflog append");
    Ok(undo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdb_types::{ObjectId, Signature, Time};

    fn entry(n: u8) -> RefLogEntry {
        RefLogEntry {
            old: ObjectId::from_hash([n; 32]),
            new: ObjectId::from_hash([n + 1; 32]),
            committer: Signature::new("t", "t@example.com", Time::new(i64::from(n), 0)),
            message: format!("entry {n}"),
        }
    }

    #[test]
    fn frames_decode_in_order() {
        let mut data = Vec::new();
        for n in 0..3 {
            data.extend(encode_frame(&entry(n)).unwrap());
        }
        let decoded = decode_frames("refs/heads/main", &data);
        assert_eq!(decoded, vec![entry(0), entry(1), entry(2)]);
    }

    #[test]
    fn truncated_tail_is_ignored() {
        let mut data = encode_frame(&entry(0)).unwrap();
        let second = encode_frame(&entry(1)).unwrap();
        data.extend_from_slice(&second[..second.len() - 3]);
        assert_eq!(decode_frames("x", &data), vec![entry(0)]);
    }

    #[test]
    fn corrupt_frame_is_skipped() {
        let mut data = encode_frame(&entry(0)).unwrap();
        let first_len = data.len();
        data.extend(encode_frame(&entry(1)).unwrap());
        data.extend(encode_frame(&entry(2)).unwrap());
        // Flip a payload byte in the second frame.
        data[first_len + HEADER_SIZE + 1] ^= 0xff;
        assert_eq!(decode_frames("x", &data), vec![entry(0), entry(2)]);
    }

    #[test]
    fn append_and_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/refs/heads/main");

        append_entry(&path, &entry(0), &SyncMode::EveryWrite).unwrap();
        let undo = append_entry(&path, &entry(1), &SyncMode::OsDefault).unwrap();
        assert_eq!(read_log_file("main", &path).unwrap().len(), 2);

        undo.rollback();
        assert_eq!(read_log_file("main", &path).unwrap(), vec![entry(0)]);
    }

    #[test]
    fn append_after_torn_tail_starts_a_fresh_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/refs/heads/main");
        append_entry(&path, &entry(0), &SyncMode::OsDefault).unwrap();
        let intact = fs::metadata(&path).unwrap().len();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xab; 11]).unwrap();
        drop(file);
        assert_eq!(read_log_file("main", &path).unwrap().len(), 1);

        append_entry(&path, &entry(1), &SyncMode::OsDefault).unwrap();
        append_entry(&path, &entry(2), &SyncMode::OsDefault).unwrap();
        assert_eq!(
            read_log_file("main", &path).unwrap(),
            vec![entry(0), entry(1), entry(2)]
        );
        let frame_len = encode_frame(&entry(1)).unwrap().len() as u64;
        assert_eq!(fs::metadata(&path).unwrap().len(), intact + 2 * frame_len);
    }

    #[test]
    fn rollback_after_trimming_keeps_intact_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/HEAD");
        append_entry(&path, &entry(0), &SyncMode::OsDefault).unwrap();
        let mut torn = encode_frame(&entry(9)).unwrap();
        torn.truncate(torn.len() / 2);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&torn).unwrap();
        drop(file);

        let undo = append_entry(&path, &entry(1), &SyncMode::OsDefault).unwrap();
        undo.rollback();
        assert_eq!(read_log_file("HEAD", &path).unwrap(), vec![entry(0)]);
        append_entry(&path, &entry(2), &SyncMode::OsDefault).unwrap();
        assert_eq!(read_log_file("HEAD", &path).unwrap(), vec![entry(0), entry(2)]);
    }

    #[test]
    fn rollback_of_first_append_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/HEAD");
        let undo = append_entry(&path, &entry(0), &SyncMode::OsDefault).unwrap();
        undo.rollback();
        assert!(!path.exists());
        assert!(read_log_file("HEAD", &path).unwrap().is_empty());
    }
}
