//! Key-range filter: decides whether a keyspace id falls within the half
//! open interval `[start, end)` this player is responsible for.
//!
//! Keyspace ids are fixed-width 8-byte big-endian values, matching the wire
//! representation used for keyrange bounds. An empty bound means unbounded
//! on that side.

use crate::errors::{PlayerError, PlayerResult};

#[derive(Debug, Clone)]
pub struct KeyRange {
    start: Option<[u8; 8]>,
    end: Option<[u8; 8]>,
}

impl KeyRange {
    /// Decodes the hex-encoded start/end bounds once at startup. At least
    /// one of the two must be non-empty.
    pub fn from_hex(start_hex: &str, end_hex: &str) -> PlayerResult<Self> {
        if start_hex.is_empty() && end_hex.is_empty() {
            return Err(PlayerError::config(
                "keyrange must have at least one non-empty bound",
            ));
        }
        Ok(Self {
            start: decode_bound(start_hex)?,
            end: decode_bound(end_hex)?,
        })
    }

    pub fn contains(&self, keyspace_id: u64) -> bool {
        let bytes = keyspace_id.to_be_bytes();
        if let Some(start) = &self.start {
            if bytes < *start {
                return false;
            }
        }
        if let Some(end) = &self.end {
            if bytes >= *end {
                return false;
            }
        }
        true
    }

    /// Parses the decimal keyspace id string carried on an event and tests
    /// containment. A non-numeric id is a protocol error, not a silent
    /// rejection, since it indicates a malformed event rather than routing.
    pub fn contains_decimal(&self, keyspace_id: &str) -> PlayerResult<bool> {
        let value: u64 = keyspace_id
            .parse()
            .map_err(|_| PlayerError::protocol(format!("invalid keyspace id '{keyspace_id}'")))?;
        Ok(self.contains(value))
    }
}

fn decode_bound(hex: &str) -> PlayerResult<Option<[u8; 8]>> {
    if hex.is_empty() {
        return Ok(None);
    }
    let mut bytes = hex::decode(hex)
        .map_err(|e| PlayerError::config(format!("invalid keyrange hex '{hex}': {e}")))?;
    if bytes.len() > 8 {
        return Err(PlayerError::config(format!(
            "keyrange hex '{hex}' exceeds 8 bytes"
        )));
    }
    // Left-pad to 8 bytes so comparisons are purely lexicographic.
    let mut padded = vec![0u8; 8 - bytes.len()];
    padded.append(&mut bytes);
    Ok(Some(padded.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_full_universe_range() {
        assert!(KeyRange::from_hex("", "").is_err());
    }

    #[test]
    fn half_open_interval_excludes_end() {
        let kr = KeyRange::from_hex("1000000000000000", "2000000000000000").unwrap();
        assert!(!kr.contains(0x0FFF_FFFF_FFFF_FFFF));
        assert!(kr.contains(0x1000_0000_0000_0000));
        assert!(kr.contains(0x1FFF_FFFF_FFFF_FFFF));
        assert!(!kr.contains(0x2000_0000_0000_0000));
    }

    #[test]
    fn empty_start_is_negative_infinity() {
        let kr = KeyRange::from_hex("", "1000000000000000").unwrap();
        assert!(kr.contains(0));
    }

    #[test]
    fn empty_end_is_positive_infinity() {
        let kr = KeyRange::from_hex("1000000000000000", "").unwrap();
        assert!(kr.contains(u64::MAX));
    }

    #[test]
    fn rejects_non_numeric_keyspace_id() {
        let kr = KeyRange::from_hex("", "1000000000000000").unwrap();
        assert!(kr.contains_decimal("not-a-number").is_err());
    }
}
