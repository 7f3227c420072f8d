//! Record framing for segment files
//!
//! Record format (all lengths little-endian):
//! [TOTAL:4][KEY_LEN:4][KEY:n][VAL_LEN:4][VALUE:m][HASH:40]
//!
//! TOTAL includes its own four bytes. HASH is the hex SHA-1 of VALUE.

use crate::common::{sha1_hex, Error, Result, HASH_HEX_LEN};
use std::io::{ErrorKind, Read};

/// Frame bytes taken by the three length fields.
pub const HEADER_LEN: usize = 12;

/// Smallest decodable frame: the headers plus the digest of an empty value.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + HASH_HEX_LEN;

/// A single key/value record with its integrity digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub hash: String,
}

impl Entry {
    /// Build a record for a key/value pair, computing the value digest.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let hash = sha1_hex(value.as_bytes());
        Self {
            key: key.into(),
            value,
            hash,
        }
    }

    /// Encoded frame length in bytes.
    pub fn encoded_len(&self) -> u64 {
        (HEADER_LEN + self.key.len() + self.value.len() + HASH_HEX_LEN) as u64
    }

    /// Serialize to one frame. The digest is recomputed from the value;
    /// a caller-supplied hash is never written.
    pub fn encode(&self) -> Vec<u8> {
        let hash = sha1_hex(self.value.as_bytes());
        let total = HEADER_LEN + self.key.len() + self.value.len() + hash.len();
        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.value.as_bytes());
        buf.extend_from_slice(hash.as_bytes());
        buf
    }

    /// Parse one complete frame. The stored digest is taken as-is; readers
    /// verify it against the value separately.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(Error::Corrupted(format!(
                "frame too short: {} bytes",
                buf.len()
            )));
        }

        let total = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        if total != buf.len() {
            return Err(Error::Corrupted(format!(
                "frame length mismatch: header says {}, got {}",
                total,
                buf.len()
            )));
        }

        let key_len = u32::from_le_bytes(buf[4..8].try_into().unwrap()) as usize;
        let key_end = match 8usize.checked_add(key_len) {
            Some(end) if end + 4 <= buf.len() => end,
            _ => return Err(Error::Corrupted("key length exceeds frame".into())),
        };
        let key = std::str::from_utf8(&buf[8..key_end])
            .map_err(|_| Error::Corrupted("key is not valid UTF-8".into()))?;

        let val_len =
            u32::from_le_bytes(buf[key_end..key_end + 4].try_into().unwrap()) as usize;
        let val_end = match (key_end + 4).checked_add(val_len) {
            Some(end) if end <= buf.len() => end,
            _ => return Err(Error::Corrupted("value length exceeds frame".into())),
        };
        let value = std::str::from_utf8(&buf[key_end + 4..val_end])
            .map_err(|_| Error::Corrupted("value is not valid UTF-8".into()))?;

        let hash = &buf[val_end..];
        if hash.len() != HASH_HEX_LEN {
            return Err(Error::Corrupted(format!(
                "hash field is {} bytes, want {}",
                hash.len(),
                HASH_HEX_LEN
            )));
        }
        let hash = std::str::from_utf8(hash)
            .map_err(|_| Error::Corrupted("hash is not valid UTF-8".into()))?;

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
            hash: hash.to_string(),
        })
    }
}

/// Read one length-prefixed frame. Returns `None` on clean EOF at a frame
/// boundary; EOF inside a frame is a corrupt record.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut size_buf = [0u8; 4];
    let mut filled = 0;
    while filled < size_buf.len() {
        match reader.read(&mut size_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(Error::Corrupted("truncated frame header".into())),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }

    let total = u32::from_le_bytes(size_buf) as usize;
    if total < MIN_FRAME_LEN {
        return Err(Error::Corrupted(format!(
            "frame size {} below minimum {}",
            total, MIN_FRAME_LEN
        )));
    }

    let mut frame = vec![0u8; total];
    frame[..4].copy_from_slice(&size_buf);
    reader.read_exact(&mut frame[4..]).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::Corrupted("truncated frame body".into())
        } else {
            Error::Io(e)
        }
    })?;
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_roundtrip() {
        let entry = Entry::new("key", "value");
        let decoded = Entry::decode(&entry.encode()).unwrap();

        assert_eq!(decoded.key, "key");
        assert_eq!(decoded.value, "value");
        assert_eq!(decoded.hash, entry.hash);
        assert_eq!(decoded.hash, sha1_hex(b"value"));
    }

    #[test]
    fn test_encode_ignores_caller_hash() {
        let entry = Entry {
            key: "key".to_string(),
            value: "value".to_string(),
            hash: "bogus".to_string(),
        };
        let decoded = Entry::decode(&entry.encode()).unwrap();
        assert_eq!(decoded.hash, sha1_hex(b"value"));
    }

    #[test]
    fn test_encoded_len_matches_encoding() {
        let entry = Entry::new("test-key0", "test-value");
        assert_eq!(entry.encoded_len(), entry.encode().len() as u64);
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        assert!(matches!(
            Entry::decode(&[0u8; 10]),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_decode_rejects_inconsistent_lengths() {
        let mut buf = Entry::new("key", "value").encode();
        // claim a key longer than the frame
        buf[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(Entry::decode(&buf), Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_decode_rejects_total_mismatch() {
        let mut buf = Entry::new("key", "value").encode();
        let bad_total = (buf.len() as u32) + 1;
        buf[0..4].copy_from_slice(&bad_total.to_le_bytes());
        assert!(matches!(Entry::decode(&buf), Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_read_frame_sequence() {
        let mut data = Entry::new("a", "1").encode();
        data.extend(Entry::new("b", "2").encode());
        let mut reader = Cursor::new(data);

        let first = read_frame(&mut reader).unwrap().unwrap();
        assert_eq!(Entry::decode(&first).unwrap().key, "a");
        let second = read_frame(&mut reader).unwrap().unwrap();
        assert_eq!(Entry::decode(&second).unwrap().key, "b");
        assert!(read_frame(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_read_frame_truncated() {
        let data = Entry::new("a", "1").encode();
        let mut reader = Cursor::new(&data[..data.len() - 3]);
        assert!(matches!(
            read_frame(&mut reader),
            Err(Error::Corrupted(_))
        ));
    }
}
