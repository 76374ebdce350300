use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// The hash algorithm an [`ObjectId`] was produced with.
///
/// Only the width matters to the reference store: SHA-1 ids are 20 bytes,
/// BLAKE3 ids are 32.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashKind {
    Sha1,
    Blake3,
}

impl HashKind {
    /// Width of an id in bytes.
    pub const fn len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Blake3 => 32,
        }
    }

    /// Width of an id in hex digits.
    pub const fn hex_len(&self) -> usize {
        self.len() * 2
    }

    /// The hash kind with the given byte width, if any.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            20 => Some(Self::Sha1),
            32 => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// Content-addressed identifier for an object.
///
/// Two ids are equal iff their byte sequences are equal, and they order
/// lexicographically by bytes. Bytes past the kind's width are always zero.
#[derive(Clone, Copy)]
pub struct ObjectId {
    kind: HashKind,
    bytes: [u8; 32],
}

impl ObjectId {
    /// Compute a BLAKE3 `ObjectId` from raw content.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_hash(*blake3::hash(data).as_bytes())
    }

    /// Wrap a pre-computed 32-byte BLAKE3 hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self {
            kind: HashKind::Blake3,
            bytes: hash,
        }
    }

    /// Wrap a pre-computed 20-byte SHA-1 hash.
    pub fn from_sha1(hash: [u8; 20]) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..20].copy_from_slice(&hash);
        Self {
            kind: HashKind::Sha1,
            bytes,
        }
    }

    /// Build an id from a 20- or 32-byte slice.
    pub fn from_slice(raw: &[u8]) -> Result<Self, TypeError> {
        let kind =
            HashKind::from_len(raw.len()).ok_or(TypeError::InvalidLength { actual: raw.len() })?;
        let mut bytes = [0u8; 32];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self { kind, bytes })
    }

    /// The null id (all zeros) of the given kind. Represents "no object".
    pub const fn null(kind: HashKind) -> Self {
        Self {
            kind,
            bytes: [0u8; 32],
        }
    }

    /// Returns `true` if every byte is zero.
    pub fn is_null(&self) -> bool {
        self.bytes == [0u8; 32]
    }

    /// The hash algorithm of this id.
    pub fn kind(&self) -> HashKind {
        self.kind
    }

    /// The id's bytes (20 or 32 of them).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.kind.len()]
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.bytes[..4])
    }

    /// Parse a full-length id from 40 or 64 hex digits (either case).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if HashKind::from_len(s.len() / 2).is_none() || s.len() % 2 != 0 {
            return Err(TypeError::InvalidLength { actual: s.len() / 2 });
        }
        let raw = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&raw)
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ObjectId {}

impl Hash for ObjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for ObjectId {
    fn from(bytes: [u8; 32]) -> Self {
        Self::from_hash(bytes)
    }
}

impl From<[u8; 20]> for ObjectId {
    fn from(bytes: [u8; 20]) -> Self {
        Self::from_sha1(bytes)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Minimum number of hex digits accepted as an abbreviated id.
pub const MIN_PREFIX_LEN: usize = 4;

/// An abbreviated object id: 4 to 64 lowercase hex digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HexPrefix(String);

impl HexPrefix {
    /// Validate and normalize a hex prefix.
    pub fn new(s: &str) -> Result<Self, TypeError> {
        if s.len() < MIN_PREFIX_LEN || s.len() > HashKind::Blake3.hex_len() {
            return Err(TypeError::InvalidPrefix {
                prefix: s.to_string(),
                reason: format!(
                    "length must be between {MIN_PREFIX_LEN} and {}",
                    HashKind::Blake3.hex_len()
                ),
            });
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidPrefix {
                prefix: s.to_string(),
                reason: "contains non-hex characters".into(),
            });
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Returns `true` if `s` looks like a hex prefix (without allocating).
    pub fn is_candidate(s: &str) -> bool {
        s.len() >= MIN_PREFIX_LEN
            && s.len() <= HashKind::Blake3.hex_len()
            && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Number of hex digits in the prefix.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: a prefix has at least [`MIN_PREFIX_LEN`] digits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalized hex digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `id`'s hex form starts with this prefix.
    pub fn matches(&self, id: &ObjectId) -> bool {
        self.0.len() <= id.kind().hex_len() && id.to_hex().starts_with(&self.0)
    }
}

impl fmt::Display for HexPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
