//! Journal record framing for [`crate::FileStore`].
//!
//! ```text
//! header:  magic "AJNL" | version u16
//! record:  len u32 | crc32 u32 | payload (len bytes)
//! payload: clock u64 | op count u32 | op*
//! op:      tag u8 (1 = set, 2 = delete) | key len u32 | key | [value len u32 | value]
//! ```
//!
//! All integers are little-endian. The CRC covers the payload only.

use crate::batch::BatchOp;
use crate::error::{StorageError, StorageResult};
use crate::store::DbTime;

/// Magic bytes at the start of every journal.
pub const JOURNAL_MAGIC: [u8; 4] = *b"AJNL";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Size of the journal header.
pub const HEADER_SIZE: usize = 6;

const FRAME_SIZE: usize = 8;
const TAG_SET: u8 = 1;
const TAG_DELETE: u8 = 2;

/// Returns the journal header bytes.
pub fn header() -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[..4].copy_from_slice(&JOURNAL_MAGIC);
    buf[4..].copy_from_slice(&JOURNAL_VERSION.to_le_bytes());
    buf
}

/// Encodes one applied batch as a framed record.
pub fn encode_record(clock: DbTime, ops: &[BatchOp]) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&clock.as_u64().to_le_bytes());
    payload.extend_from_slice(&len_u32(ops.len())?.to_le_bytes());
    for op in ops {
        match op {
            BatchOp::Set { key, value } => {
                payload.push(TAG_SET);
                put_bytes(&mut payload, key)?;
                put_bytes(&mut payload, value)?;
            }
            BatchOp::Delete { key } => {
                payload.push(TAG_DELETE);
                put_bytes(&mut payload, key)?;
            }
        }
    }

    let mut record = Vec::with_capacity(FRAME_SIZE + payload.len());
    record.extend_from_slice(&len_u32(payload.len())?.to_le_bytes());
    record.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
    record.extend_from_slice(&payload);
    Ok(record)
}

fn len_u32(len: usize) -> StorageResult<u32> {
    u32::try_from(len).map_err(|_| StorageError::TooLarge { len })
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> StorageResult<()> {
    buf.extend_from_slice(&len_u32(bytes.len())?.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// A batch recovered from the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    /// Store clock after the batch was applied.
    pub clock: DbTime,
    /// The batch's operations.
    pub ops: Vec<BatchOp>,
}

/// Outcome of replaying a journal image.
#[derive(Debug, Default)]
pub struct Replay {
    /// Intact records in journal order.
    pub records: Vec<Recovered>,
    /// Length of the intact prefix (header included).
    pub valid_len: u64,
    /// True if bytes after `valid_len` were discarded.
    pub torn: bool,
}

/// Replays a journal image.
///
/// Records are read until the first incomplete or checksum-failing
/// frame, which is reported as a torn tail. A partial header is torn
/// too, with nothing valid. A bad header or a payload
/// that passes its checksum but does not parse is corruption.
pub fn replay(data: &[u8]) -> StorageResult<Replay> {
    if data.len() < HEADER_SIZE && header().starts_with(data) {
        // Empty, or a crash while the header was being written.
        return Ok(Replay {
            torn: !data.is_empty(),
            ..Replay::default()
        });
    }
    if data.len() < HEADER_SIZE || data[..4] != JOURNAL_MAGIC {
        return Err(StorageError::corrupted(0, "bad journal header"));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != JOURNAL_VERSION {
        return Err(StorageError::corrupted(
            0,
            format!("unsupported journal version {version}"),
        ));
    }

    let mut out = Replay {
        valid_len: HEADER_SIZE as u64,
        ..Replay::default()
    };
    let mut pos = HEADER_SIZE;
    while pos < data.len() {
        if data.len() - pos < FRAME_SIZE {
            out.torn = true;
            break;
        }
        let len = u32::from_le_bytes(word(&data[pos..pos + 4])) as usize;
        let crc = u32::from_le_bytes(word(&data[pos + 4..pos + 8]));
        let start = pos + FRAME_SIZE;
        let Some(end) = start.checked_add(len).filter(|&end| end <= data.len()) else {
            out.torn = true;
            break;
        };
        let payload = &data[start..end];
        if compute_crc32(payload) != crc {
            out.torn = true;
            break;
        }
        let record = decode_payload(payload)
            .map_err(|message| StorageError::corrupted(pos as u64, message))?;
        out.records.push(record);
        pos = end;
        out.valid_len = pos as u64;
    }
    Ok(out)
}

fn word(bytes: &[u8]) -> [u8; 4] {
    let mut w = [0u8; 4];
    w.copy_from_slice(bytes);
    w
}

fn decode_payload(payload: &[u8]) -> Result<Recovered, String> {
    let mut reader = Reader { data: payload, pos: 0 };
    let clock = DbTime::new(reader.u64()?);
    let count = reader.u32()?;
    let mut ops = Vec::new();
    for _ in 0..count {
        let op = match reader.u8()? {
            TAG_SET => {
                let key = reader.bytes()?;
                let value = reader.bytes()?;
                BatchOp::Set { key, value }
            }
            TAG_DELETE => BatchOp::Delete {
                key: reader.bytes()?,
            },
            tag => return Err(format!("unknown op tag {tag}")),
        };
        ops.push(op);
    }
    if reader.pos != payload.len() {
        return Err("trailing bytes in record".into());
    }
    Ok(Recovered { clock, ops })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| "unexpected end of record".to_string())?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(word(self.take(4)?)))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let mut w = [0u8; 8];
        w.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(w))
    }

    fn bytes(&mut self) -> Result<Vec<u8>, String> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

/// Computes a CRC32 checksum (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
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

    fn sample_ops() -> Vec<BatchOp> {
        vec![
            BatchOp::Set {
                key: b"k1".to_vec(),
                value: b"v1".to_vec(),
            },
            BatchOp::Delete {
                key: b"k0".to_vec(),
            },
        ]
    }

    fn image(records: &[Vec<u8>]) -> Vec<u8> {
        let mut data = header().to_vec();
        for r in records {
            data.extend_from_slice(r);
        }
        data
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn replay_reads_all_records() {
        let r1 = encode_record(DbTime::new(1), &sample_ops()).unwrap();
        let r2 = encode_record(DbTime::new(4), &[]).unwrap();
        let data = image(&[r1, r2]);

        let replay = replay(&data).unwrap();
        assert!(!replay.torn);
        assert_eq!(replay.valid_len, data.len() as u64);
        assert_eq!(replay.records.len(), 2);
        assert_eq!(replay.records[0].ops, sample_ops());
        assert_eq!(replay.records[1].clock, DbTime::new(4));
    }

    #[test]
    fn replay_empty_image() {
        let replay = replay(&[]).unwrap();
        assert!(replay.records.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn replay_stops_at_partial_record() {
        let r1 = encode_record(DbTime::new(1), &sample_ops()).unwrap();
        let r2 = encode_record(DbTime::new(2), &sample_ops()).unwrap();
        let good_len = HEADER_SIZE + r1.len();
        let mut data = image(&[r1, r2]);
        data.truncate(data.len() - 3);

        let replay = replay(&data).unwrap();
        assert!(replay.torn);
        assert_eq!(replay.records.len(), 1);
        assert_eq!(replay.valid_len, good_len as u64);
    }

    #[test]
    fn replay_stops_at_checksum_failure() {
        let r1 = encode_record(DbTime::new(1), &sample_ops()).unwrap();
        let mut r2 = encode_record(DbTime::new(2), &sample_ops()).unwrap();
        let last = r2.len() - 1;
        r2[last] ^= 0xFF;
        let data = image(&[r1, r2]);

        let replay = replay(&data).unwrap();
        assert!(replay.torn);
        assert_eq!(replay.records.len(), 1);
    }

    #[test]
    fn replay_partial_header_is_torn() {
        let replay = replay(&header()[..3]).unwrap();
        assert!(replay.torn);
        assert!(replay.records.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn replay_rejects_short_garbage() {
        let result = replay(b"XY");
        assert!(matches!(result, Err(StorageError::Corrupted { .. })));
    }

    #[test]
    fn replay_rejects_bad_header() {
        let result = replay(b"NOPE\x01\x00");
        assert!(matches!(result, Err(StorageError::Corrupted { .. })));
    }
}
