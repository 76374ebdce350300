use refdb_types::{HashKind, ObjectId, ObjectKind};

use crate::error::{GraphError, GraphResult};

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a blob and a tree with identical bytes get different ids.
/// SHA-1-width ids are the first 20 bytes of the same digest.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    pub const BLOB: Self = Self::new("refdb-blob-v1");
    pub const TREE: Self = Self::new("refdb-tree-v1");
    pub const COMMIT: Self = Self::new("refdb-commit-v1");
    pub const TAG: Self = Self::new("refdb-tag-v1");

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// The hasher used for objects of `kind`.
    pub fn for_kind(kind: ObjectKind) -> &'static Self {
        match kind {
            ObjectKind::Blob => &Self::BLOB,
            ObjectKind::Tree => &Self::TREE,
            ObjectKind::Commit => &Self::COMMIT,
            ObjectKind::Tag => &Self::TAG,
        }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8], width: HashKind) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        let digest = *hasher.finalize().as_bytes();
        match width {
            HashKind::Blake3 => ObjectId::from_hash(digest),
            HashKind::Sha1 => {
                let mut short = [0u8; 20];
                short.copy_from_slice(&digest[..20]);
                ObjectId::from_sha1(short)
            }
        }
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T, width: HashKind) -> GraphResult<ObjectId> {
        let data = serde_json::to_vec(value).map_err(|e| GraphError::Serialization(e.to_string()))?;
        Ok(self.hash(&data, width))
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
