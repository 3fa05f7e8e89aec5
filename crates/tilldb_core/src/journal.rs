//! Append-only journal for record stores.
//!
//! Every mutation a store accepts is framed and appended to its journal
//! before the in-memory state changes. Opening a store replays the journal
//! from the top to rebuild its tables.
//!
//! ## Frame Format
//!
//! ```text
//! | magic (4) | version (2) | kind (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! Payloads are JSON. The first frame of every journal is an `Open` frame
//! naming the store and its schema version; `Upgrade` frames record later
//! schema bumps. `Op` frames hold a single mutation and `Batch` frames hold
//! a sequence of mutations that apply atomically: a batch that did not reach
//! disk in full contributes nothing at replay.
//!
//! ## Recovery Policy
//!
//! A frame cut short by a crash (truncated header or payload) marks the end
//! of the journal. The torn bytes are discarded and the file truncated back
//! to the last complete frame. Anything else that fails to parse (bad magic,
//! unknown kind, checksum mismatch, unsupported version) is real corruption
//! and opening fails rather than silently dropping data.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tilldb_storage::JournalBackend;

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::schema::{StoreKind, Table};

/// Magic bytes identifying a journal frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"TJNL";

/// Current journal format version.
pub const JOURNAL_FORMAT_VERSION: u16 = 1;

/// magic (4) + version (2) + kind (1) + length (4).
const FRAME_HEADER_SIZE: usize = 11;

/// CRC size.
const CRC_SIZE: usize = 4;

/// Type of journal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum FrameKind {
    /// First frame: store kind and schema version.
    Open = 1,
    /// A single mutation.
    Op = 2,
    /// A sequence of mutations applied atomically.
    Batch = 3,
    /// Schema version bump.
    Upgrade = 4,
}

impl FrameKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Open),
            2 => Some(Self::Op),
            3 => Some(Self::Batch),
            4 => Some(Self::Upgrade),
            _ => None,
        }
    }

    const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single mutation recorded in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum JournalOp {
    /// Insert or replace the document stored under `id`.
    Put {
        /// Table the document belongs to.
        table: Table,
        /// Record id.
        id: String,
        /// Full document body.
        doc: Document,
    },
    /// Remove the document stored under `id`.
    Delete {
        /// Table the document belongs to.
        table: Table,
        /// Record id.
        id: String,
    },
    /// Remove every document in the table.
    Clear {
        /// Table to empty.
        table: Table,
    },
}

impl JournalOp {
    /// Returns the table this operation targets.
    #[must_use]
    pub fn table(&self) -> Table {
        match self {
            Self::Put { table, .. } | Self::Delete { table, .. } | Self::Clear { table } => *table,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenPayload {
    store: StoreKind,
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct UpgradePayload {
    version: u32,
}

/// Outcome of replaying a journal at open time.
#[derive(Debug)]
pub struct JournalReplay {
    /// Schema version the journal was at before this open.
    pub version: u32,
    /// Surviving operations in write order, with batches inlined.
    pub ops: Vec<JournalOp>,
    /// Torn tail bytes discarded during recovery.
    pub discarded: u64,
}

/// Append-only journal over a storage backend.
///
/// The journal serializes its own writes; callers may share it behind an
/// `Arc` and append from any thread.
pub struct Journal {
    backend: Mutex<Box<dyn JournalBackend>>,
}

impl Journal {
    /// Opens a journal on `backend` for the given store at `version`.
    ///
    /// An empty backend gets a fresh `Open` frame. A non-empty backend is
    /// replayed; its header must name the same store kind. If the journal
    /// was written at an older schema version an `Upgrade` frame is
    /// appended, recording the bump.
    ///
    /// # Errors
    ///
    /// Fails on corruption, on a store-kind mismatch, or when the journal
    /// was written at a schema version newer than `version`.
    pub fn open(
        backend: Box<dyn JournalBackend>,
        kind: StoreKind,
        version: u32,
    ) -> StoreResult<(Self, JournalReplay)> {
        let bytes = backend.read_all()?;
        let journal = Self {
            backend: Mutex::new(backend),
        };

        if bytes.is_empty() {
            journal.append_frame(
                FrameKind::Open,
                &serde_json::to_vec(&OpenPayload {
                    store: kind,
                    version,
                })?,
            )?;
            journal.sync()?;
            return Ok((
                journal,
                JournalReplay {
                    version,
                    ops: Vec::new(),
                    discarded: 0,
                },
            ));
        }

        let (frames, good_end) = scan_frames(&bytes)?;
        let discarded = bytes.len() as u64 - good_end as u64;
        if discarded > 0 {
            tracing::warn!(
                store = kind.name(),
                discarded,
                "discarding torn journal tail"
            );
            journal.backend.lock().truncate(good_end as u64)?;
        }

        let mut found_version: Option<u32> = None;
        let mut ops = Vec::new();
        for frame in frames {
            match frame.kind {
                FrameKind::Open => {
                    let header: OpenPayload = serde_json::from_slice(frame.payload)?;
                    if header.store != kind {
                        return Err(StoreError::invalid_format(format!(
                            "journal belongs to the {} store, not {}",
                            header.store.name(),
                            kind.name()
                        )));
                    }
                    found_version = Some(header.version);
                }
                FrameKind::Op => {
                    ops.push(serde_json::from_slice(frame.payload)?);
                }
                FrameKind::Batch => {
                    let batch: Vec<JournalOp> = serde_json::from_slice(frame.payload)?;
                    ops.extend(batch);
                }
                FrameKind::Upgrade => {
                    let upgrade: UpgradePayload = serde_json::from_slice(frame.payload)?;
                    found_version = Some(upgrade.version);
                }
            }
        }

        let journal_version = found_version
            .ok_or_else(|| StoreError::journal_corrupted("journal has no open frame"))?;
        if journal_version > version {
            return Err(StoreError::invalid_format(format!(
                "journal written at schema version {journal_version}, \
                 but this build supports up to {version}"
            )));
        }
        if journal_version < version {
            tracing::debug!(
                store = kind.name(),
                from = journal_version,
                to = version,
                "upgrading store schema"
            );
            journal.append_frame(
                FrameKind::Upgrade,
                &serde_json::to_vec(&UpgradePayload { version })?,
            )?;
            journal.sync()?;
        }

        Ok((
            journal,
            JournalReplay {
                version: journal_version,
                ops,
                discarded,
            },
        ))
    }

    /// Appends a single operation frame.
    pub fn append_op(&self, op: &JournalOp) -> StoreResult<()> {
        self.append_frame(FrameKind::Op, &serde_json::to_vec(op)?)
    }

    /// Appends a batch frame. The whole batch replays or none of it does.
    ///
    /// An empty batch writes nothing.
    pub fn append_batch(&self, ops: &[JournalOp]) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.append_frame(FrameKind::Batch, &serde_json::to_vec(ops)?)
    }

    /// Forces all appended frames to durable storage.
    pub fn sync(&self) -> StoreResult<()> {
        let mut backend = self.backend.lock();
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Returns the journal size in bytes.
    pub fn size(&self) -> StoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Replaces the journal contents with a fresh header and one batch of
    /// `ops`. Used to compact away overwritten and deleted records.
    ///
    /// Not crash-atomic; callers run it at quiescent points such as close.
    pub fn rewrite(&self, kind: StoreKind, version: u32, ops: &[JournalOp]) -> StoreResult<()> {
        let mut data = encode_frame(
            FrameKind::Open,
            &serde_json::to_vec(&OpenPayload {
                store: kind,
                version,
            })?,
        )?;
        if !ops.is_empty() {
            data.extend_from_slice(&encode_frame(FrameKind::Batch, &serde_json::to_vec(ops)?)?);
        }

        let mut backend = self.backend.lock();
        backend.truncate(0)?;
        backend.append(&data)?;
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    fn append_frame(&self, kind: FrameKind, payload: &[u8]) -> StoreResult<()> {
        let data = encode_frame(kind, payload)?;
        let mut backend = self.backend.lock();
        backend.append(&data)?;
        backend.flush()?;
        Ok(())
    }
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journal").finish_non_exhaustive()
    }
}

fn encode_frame(kind: FrameKind, payload: &[u8]) -> StoreResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::invalid_format("journal frame payload too large"))?;

    let mut data = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&JOURNAL_MAGIC);
    data.extend_from_slice(&JOURNAL_FORMAT_VERSION.to_le_bytes());
    data.push(kind.as_byte());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(payload);

    // CRC over everything before it
    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

struct RawFrame<'a> {
    kind: FrameKind,
    payload: &'a [u8],
}

/// Walks the journal bytes, returning complete frames and the offset where
/// the last complete frame ends. A truncated trailing frame is tolerated;
/// everything else that fails to parse is an error.
fn scan_frames(bytes: &[u8]) -> StoreResult<(Vec<RawFrame<'_>>, usize)> {
    let mut frames = Vec::new();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        let remaining = bytes.len() - cursor;
        if remaining < FRAME_HEADER_SIZE {
            break;
        }

        let header = &bytes[cursor..cursor + FRAME_HEADER_SIZE];
        if header[0..4] != JOURNAL_MAGIC {
            return Err(StoreError::journal_corrupted(format!(
                "bad frame magic at offset {cursor}"
            )));
        }
        let format = u16::from_le_bytes([header[4], header[5]]);
        if format > JOURNAL_FORMAT_VERSION {
            return Err(StoreError::journal_corrupted(format!(
                "unsupported journal format version {format}"
            )));
        }
        let kind = FrameKind::from_byte(header[6]).ok_or_else(|| {
            StoreError::journal_corrupted(format!(
                "unknown frame kind {} at offset {cursor}",
                header[6]
            ))
        })?;
        let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        if remaining < FRAME_HEADER_SIZE + len + CRC_SIZE {
            break;
        }

        let payload_start = cursor + FRAME_HEADER_SIZE;
        let payload = &bytes[payload_start..payload_start + len];
        let crc_start = payload_start + len;
        let expected = u32::from_le_bytes([
            bytes[crc_start],
            bytes[crc_start + 1],
            bytes[crc_start + 2],
            bytes[crc_start + 3],
        ]);
        let actual = compute_crc32(&bytes[cursor..crc_start]);
        if expected != actual {
            return Err(StoreError::ChecksumMismatch { expected, actual });
        }

        frames.push(RawFrame { kind, payload });
        cursor = crc_start + CRC_SIZE;
    }

    Ok((frames, cursor))
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, table built at compile time
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tilldb_storage::{FileBackend, MemoryBackend};

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn put(id: &str) -> JournalOp {
        JournalOp::Put {
            table: Table::Customers,
            id: id.to_string(),
            doc: doc(json!({"id": id, "name": "Asha"})),
        }
    }

    #[test]
    fn crc32_known_value() {
        // Known test vector: "123456789" should give 0xCBF43926
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn fresh_journal_writes_a_header() {
        let (journal, replay) =
            Journal::open(Box::new(MemoryBackend::new()), StoreKind::Business, 2).unwrap();
        assert_eq!(replay.version, 2);
        assert!(replay.ops.is_empty());
        assert_eq!(replay.discarded, 0);
        assert!(journal.size().unwrap() > 0);
    }

    #[test]
    fn ops_replay_in_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.journal");
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            let (journal, _) = Journal::open(backend, StoreKind::Business, 2).unwrap();
            journal.append_op(&put("cust-1")).unwrap();
            journal
                .append_op(&JournalOp::Delete {
                    table: Table::Customers,
                    id: "cust-1".to_string(),
                })
                .unwrap();
            journal.append_op(&put("cust-2")).unwrap();
            journal.sync().unwrap();
        }

        let backend = Box::new(FileBackend::open(&path).unwrap());
        let (_journal, replay) = Journal::open(backend, StoreKind::Business, 2).unwrap();
        assert_eq!(replay.ops.len(), 3);
        assert!(matches!(&replay.ops[0], JournalOp::Put { id, .. } if id == "cust-1"));
        assert!(matches!(&replay.ops[1], JournalOp::Delete { id, .. } if id == "cust-1"));
        assert!(matches!(&replay.ops[2], JournalOp::Put { id, .. } if id == "cust-2"));
    }

    #[test]
    fn batches_replay_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.journal");
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            let (journal, _) = Journal::open(backend, StoreKind::Business, 2).unwrap();
            journal
                .append_batch(&[put("cust-1"), put("cust-2")])
                .unwrap();
            journal.sync().unwrap();
        }

        let backend = Box::new(FileBackend::open(&path).unwrap());
        let (_journal, replay) = Journal::open(backend, StoreKind::Business, 2).unwrap();
        assert_eq!(replay.ops.len(), 2);
    }

    #[test]
    fn empty_batch_writes_no_frame() {
        let (journal, _) =
            Journal::open(Box::new(MemoryBackend::new()), StoreKind::Business, 2).unwrap();
        let before = journal.size().unwrap();
        journal.append_batch(&[]).unwrap();
        assert_eq!(journal.size().unwrap(), before);
    }

    #[test]
    fn torn_tail_is_discarded_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.journal");
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            let (journal, _) = Journal::open(backend, StoreKind::Business, 2).unwrap();
            journal.append_op(&put("cust-1")).unwrap();
            journal.sync().unwrap();
        }
        let good_size = std::fs::metadata(&path).unwrap().len();

        // Simulate a crash mid-append: half a frame header at the tail.
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(b"TJNL\x01\x00").unwrap();
        drop(file);

        let backend = Box::new(FileBackend::open(&path).unwrap());
        let (_journal, replay) = Journal::open(backend, StoreKind::Business, 2).unwrap();
        assert_eq!(replay.ops.len(), 1);
        assert_eq!(replay.discarded, 6);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good_size);
    }

    #[test]
    fn bit_rot_fails_the_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.journal");
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            let (journal, _) = Journal::open(backend, StoreKind::Business, 2).unwrap();
            journal.append_op(&put("cust-1")).unwrap();
            journal.sync().unwrap();
        }

        // Flip one payload byte inside the first frame.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[FRAME_HEADER_SIZE + 2] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let backend = Box::new(FileBackend::open(&path).unwrap());
        let err = Journal::open(backend, StoreKind::Business, 2).unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn store_kind_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.journal");
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            Journal::open(backend, StoreKind::Business, 2).unwrap();
        }

        let backend = Box::new(FileBackend::open(&path).unwrap());
        let err = Journal::open(backend, StoreKind::Reference, 1).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
    }

    #[test]
    fn schema_upgrades_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.journal");
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            let (_journal, replay) = Journal::open(backend, StoreKind::Business, 1).unwrap();
            assert_eq!(replay.version, 1);
        }
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            let (_journal, replay) = Journal::open(backend, StoreKind::Business, 2).unwrap();
            // As found before the upgrade frame was appended.
            assert_eq!(replay.version, 1);
        }
        let backend = Box::new(FileBackend::open(&path).unwrap());
        let (_journal, replay) = Journal::open(backend, StoreKind::Business, 2).unwrap();
        assert_eq!(replay.version, 2);
    }

    #[test]
    fn downgrade_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.journal");
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            Journal::open(backend, StoreKind::Business, 2).unwrap();
        }

        let backend = Box::new(FileBackend::open(&path).unwrap());
        let err = Journal::open(backend, StoreKind::Business, 1).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
    }

    #[test]
    fn rewrite_compacts_to_header_plus_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.journal");
        {
            let backend = Box::new(FileBackend::open(&path).unwrap());
            let (journal, _) = Journal::open(backend, StoreKind::Business, 2).unwrap();
            for i in 0..20 {
                journal.append_op(&put(&format!("cust-{i}"))).unwrap();
            }
            for i in 0..19 {
                journal
                    .append_op(&JournalOp::Delete {
                        table: Table::Customers,
                        id: format!("cust-{i}"),
                    })
                    .unwrap();
            }
            let before = journal.size().unwrap();
            journal
                .rewrite(StoreKind::Business, 2, &[put("cust-19")])
                .unwrap();
            assert!(journal.size().unwrap() < before);
        }

        let backend = Box::new(FileBackend::open(&path).unwrap());
        let (_journal, replay) = Journal::open(backend, StoreKind::Business, 2).unwrap();
        assert_eq!(replay.ops.len(), 1);
        assert!(matches!(&replay.ops[0], JournalOp::Put { id, .. } if id == "cust-19"));
    }

    #[test]
    fn journal_op_reports_its_table() {
        assert_eq!(put("x").table(), Table::Customers);
        assert_eq!(
            JournalOp::Clear {
                table: Table::Masters
            }
            .table(),
            Table::Masters
        );
    }
}
