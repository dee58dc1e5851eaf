//! Document uid generation
//!
//! ID Format: 26 characters of Crockford base32 (e.g. `01J9ZQ4X7T3M8K2W5N6P0R1S2V`)
//!
//! - First 10 characters: 48-bit millisecond timestamp
//! - Last 16 characters: 80 bits of randomness
//!
//! Uids sort lexicographically in creation order. Within one process they are
//! strictly monotonic: a uid generated in the same millisecond as the previous
//! one increments the random part instead of drawing a new one.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const UID_LEN: usize = 26;
const TIME_LEN: usize = 10;
const RANDOM_BITS: u32 = 80;
const RANDOM_MASK: u128 = (1u128 << RANDOM_BITS) - 1;
const MAX_TIMESTAMP_MS: u64 = (1u64 << 48) - 1;

/// Last (timestamp, random) pair handed out by this process
static LAST: Mutex<(u64, u128)> = parking_lot::const_mutex((0, 0));

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid document uid: expected 26 Crockford base32 characters, got '{0}'")]
    InvalidDocUid(String),
}

/// Process-wide unique, time-sortable document identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocUid(String);

impl DocUid {
    /// Generates a new uid stamped with the current time
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generates a new uid stamped with `timestamp`, keeping process-wide order.
    ///
    /// If `timestamp` is not later than the previous uid's, the previous
    /// timestamp is reused and the random part incremented.
    pub fn generate_at(timestamp: DateTime<Utc>) -> Self {
        let ms = timestamp.timestamp_millis().clamp(0, MAX_TIMESTAMP_MS as i64) as u64;
        let mut last = LAST.lock();

        let (ms, random) = if ms > last.0 {
            (ms, rand::rng().random::<u128>() & RANDOM_MASK)
        } else if last.1 < RANDOM_MASK {
            (last.0, last.1 + 1)
        } else {
            // Random space for this millisecond is exhausted
            (last.0 + 1, rand::rng().random::<u128>() & (RANDOM_MASK >> 1))
        };

        *last = (ms, random);
        Self::from_parts(ms, random)
    }

    /// Builds a uid from its timestamp and random components
    pub fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        let value = ((timestamp_ms as u128 & MAX_TIMESTAMP_MS as u128) << RANDOM_BITS)
            | (random & RANDOM_MASK);
        Self(encode(value))
    }

    /// Milliseconds since the Unix epoch encoded in the uid
    pub fn timestamp_ms(&self) -> u64 {
        (decode(&self.0).unwrap_or(0) >> RANDOM_BITS) as u64
    }

    /// Creation time encoded in the uid
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms() as i64).single()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generates a new document uid. See [`DocUid::generate`].
pub fn generate_doc_uid() -> DocUid {
    DocUid::generate()
}

fn encode(mut value: u128) -> String {
    let mut buf = [0u8; UID_LEN];
    for slot in buf.iter_mut().rev() {
        *slot = ALPHABET[(value & 0x1f) as usize];
        value >>= 5;
    }
    buf.iter().map(|&b| b as char).collect()
}

fn decode_char(c: char) -> Option<u128> {
    let c = match c.to_ascii_uppercase() {
        'O' => '0',
        'I' | 'L' => '1',
        other => other,
    };
    ALPHABET
        .iter()
        .position(|&a| a as char == c)
        .map(|p| p as u128)
}

fn decode(s: &str) -> Option<u128> {
    if s.len() != UID_LEN {
        return None;
    }
    let mut chars = s.chars();
    // 26 * 5 = 130 bits, so the leading character carries only 3 bits
    let first = decode_char(chars.next()?)?;
    if first > 7 {
        return None;
    }
    chars.try_fold(first, |acc, c| Some((acc << 5) | decode_char(c)?))
}

impl fmt::Display for DocUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocUid {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match decode(s) {
            Some(value) => Ok(Self(encode(value))),
            None => Err(IdError::InvalidDocUid(s.to_string())),
        }
    }
}

impl AsRef<str> for DocUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocUid {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocUid> for String {
    fn from(id: DocUid) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_format_is_correct() {
        let uid = DocUid::generate();
        let s = uid.to_string();

        assert_eq!(s.len(), UID_LEN);
        assert!(s.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn uids_are_unique_and_sorted() {
        let uids: Vec<DocUid> = (0..1000).map(|_| DocUid::generate()).collect();

        for pair in uids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
            assert!(pair[0].as_str() < pair[1].as_str());
        }
    }

    #[test]
    fn same_millisecond_stays_monotonic() {
        let ts = Utc::now() + chrono::Duration::days(365);
        let a = DocUid::generate_at(ts);
        let b = DocUid::generate_at(ts);
        let c = DocUid::generate_at(ts - chrono::Duration::seconds(10));

        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.timestamp_ms(), b.timestamp_ms());
    }

    #[test]
    fn timestamp_round_trips() {
        let uid = DocUid::from_parts(1_700_000_000_123, 42);
        assert_eq!(uid.timestamp_ms(), 1_700_000_000_123);
        assert_eq!(
            uid.timestamp().unwrap().timestamp_millis(),
            1_700_000_000_123
        );
    }

    #[test]
    fn later_timestamp_sorts_later() {
        let early = DocUid::from_parts(1_000, u128::MAX);
        let late = DocUid::from_parts(1_001, 0);
        assert!(early < late);
    }

    #[test]
    fn parses_correctly() {
        let original = DocUid::generate();
        let parsed: DocUid = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn parse_normalizes_case_and_confusables() {
        let uid = DocUid::from_parts(1_700_000_000_000, 0x1234);
        let lower = uid.to_string().to_lowercase();
        assert_eq!(lower.parse::<DocUid>().unwrap(), uid);

        let with_o = "0O000000000000000000000000".parse::<DocUid>().unwrap();
        assert_eq!(with_o.as_str(), "00000000000000000000000000");
    }

    #[test]
    fn rejects_invalid_format() {
        assert!("".parse::<DocUid>().is_err());
        assert!("abc123".parse::<DocUid>().is_err());
        assert!("01J9ZQ4X7T3M8K2W5N6P0R1S2".parse::<DocUid>().is_err()); // 25 chars
        assert!("01J9ZQ4X7T3M8K2W5N6P0R1S2U".parse::<DocUid>().is_err()); // 'U' not in alphabet
        assert!("81J9ZQ4X7T3M8K2W5N6P0R1S2V".parse::<DocUid>().is_err()); // overflow
    }

    #[test]
    fn serde_roundtrip() {
        let original = DocUid::generate();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: DocUid = serde_json::from_str(&json).unwrap();

        assert_eq!(original, parsed);
        assert!(serde_json::from_str::<DocUid>("\"nope\"").is_err());
    }
}
