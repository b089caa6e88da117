//! Identifier shapes: object references, snapshot/batch ids, timestamps.

use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;

const HEX: &[u8] = b"0123456789abcdef";

/// A content address, canonical form `sha256:<64-hex-lowercase>`.
///
/// Every persisted record stores the canonical form. `shard_prefix` is the
/// only sanctioned way to derive a shard id from a reference - never slice
/// a raw string, since the `sha256:` tag would corrupt a naive `[0..2]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(String);

impl ObjectRef {
    /// Parse either canonical (`sha256:<hex>`) or bare hex form, always
    /// producing canonical form. Rejects anything that is not exactly 64
    /// lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s.strip_prefix("sha256:").unwrap_or(s);
        if hex.len() != 64 || !hex.bytes().all(|b| HEX.contains(&b.to_ascii_lowercase())) {
            return Err(StorageError::InvalidArgument(format!(
                "not a valid sha256 object reference: {s}"
            )));
        }
        Ok(Self(format!("sha256:{}", hex.to_ascii_lowercase())))
    }

    /// Build directly from a 32-byte digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut hex = String::with_capacity(64);
        for b in digest {
            hex.push(HEX[(b >> 4) as usize] as char);
            hex.push(HEX[(b & 0x0f) as usize] as char);
        }
        Self(format!("sha256:{hex}"))
    }

    /// The canonical `sha256:<hex>` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare 64-character hex digest, without the `sha256:` tag.
    pub fn hex(&self) -> &str {
        &self.0["sha256:".len()..]
    }

    /// The two-character shard prefix (`hex[0:2]`) that determines which of
    /// the 256 shards owns a file referencing this object.
    pub fn shard_prefix(&self) -> &str {
        &self.hex()[0..2]
    }

    /// The next two characters (`hex[2:4]`), used for the CAS directory's
    /// second fan-out level.
    pub fn second_prefix(&self) -> &str {
        &self.hex()[2..4]
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for ObjectRef {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ObjectRef {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        ObjectRef::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn random_hex8() -> String {
    let mut rng = rand::thread_rng();
    (0..8).map(|_| HEX[rng.gen_range(0..16)] as char).collect()
}

/// RFC3339 UTC timestamp with a `Z` suffix, second precision, no fractional
/// seconds. A single shared helper keeps every record's timestamp format
/// uniform instead of mixing second- and microsecond-precision formatting
/// at each call site.
pub fn now_rfc3339() -> String {
    format_rfc3339(Utc::now())
}

pub fn format_rfc3339(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Generate a new snapshot id: `snap-YYYYMMDD-HHMMSS-<8 hex>`.
pub fn new_snapshot_id() -> String {
    format!(
        "snap-{}-{}",
        Utc::now().format("%Y%m%d-%H%M%S"),
        random_hex8()
    )
}

/// Generate a new batch id: `batch-YYYYMMDD-HHMMSS-<8 hex>`.
pub fn new_batch_id() -> String {
    format!(
        "batch-{}-{}",
        Utc::now().format("%Y%m%d-%H%M%S"),
        random_hex8()
    )
}

/// All 256 two-hex-character shard ids, `00`..`ff`, in ascending order.
pub fn all_shard_ids() -> Vec<String> {
    (0u16..256)
        .map(|n| format!("{:02x}", n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_parse_canonical() {
        let hex = "a".repeat(64);
        let r = ObjectRef::parse(&format!("sha256:{hex}")).unwrap();
        assert_eq!(r.as_str(), format!("sha256:{hex}"));
        assert_eq!(r.hex(), hex);
    }

    #[test]
    fn test_object_ref_parse_bare_hex_emits_canonical() {
        let hex = "b".repeat(64);
        let r = ObjectRef::parse(&hex).unwrap();
        assert_eq!(r.as_str(), format!("sha256:{hex}"));
    }

    #[test]
    fn test_object_ref_parse_uppercase_normalized() {
        let hex_upper = "C".repeat(64);
        let r = ObjectRef::parse(&hex_upper).unwrap();
        assert_eq!(r.hex(), "c".repeat(64));
    }

    #[test]
    fn test_object_ref_parse_rejects_bad_length() {
        assert!(ObjectRef::parse("sha256:abcd").is_err());
    }

    #[test]
    fn test_object_ref_parse_rejects_non_hex() {
        let bad = "z".repeat(64);
        assert!(ObjectRef::parse(&bad).is_err());
    }

    #[test]
    fn test_shard_prefix_not_corrupted_by_tag() {
        let hex = "ab1234".to_string() + &"0".repeat(58);
        let r = ObjectRef::parse(&hex).unwrap();
        assert_eq!(r.shard_prefix(), "ab");
        assert_eq!(r.second_prefix(), "12");
    }

    #[test]
    fn test_from_digest_roundtrip() {
        let digest = [0u8; 32];
        let r = ObjectRef::from_digest(&digest);
        assert_eq!(r.hex(), "0".repeat(64));
    }

    #[test]
    fn test_snapshot_id_shape() {
        let id = new_snapshot_id();
        assert!(id.starts_with("snap-"));
        let parts: Vec<_> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[3].len(), 8);
    }

    #[test]
    fn test_batch_id_shape() {
        let id = new_batch_id();
        assert!(id.starts_with("batch-"));
    }

    #[test]
    fn test_all_shard_ids() {
        let ids = all_shard_ids();
        assert_eq!(ids.len(), 256);
        assert_eq!(ids[0], "00");
        assert_eq!(ids[255], "ff");
    }

    #[test]
    fn test_rfc3339_no_fractional_seconds() {
        let s = now_rfc3339();
        assert!(s.ends_with('Z'));
        assert!(!s.contains('.'));
    }
}
