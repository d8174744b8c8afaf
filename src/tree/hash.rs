// src/tree/hash.rs

//! Content hashing for tree entries.
//!
//! Digests are blake3 over raw bytes only: two files with identical bytes have
//! identical digests regardless of path or timestamps.

use blake3::Hasher;

/// Content digest of a single file or an aggregate of files.
pub type Digest = blake3::Hash;

/// Digest of an in-memory byte buffer.
pub fn digest_bytes(bytes: &[u8]) -> Digest {
    blake3::hash(bytes)
}

/// Aggregate digest over `(path, digest)` pairs.
///
/// Pairs must be supplied in path order so the result is stable. The path
/// participates in the hash, so moving a file changes the aggregate even if
/// no bytes changed.
pub fn aggregate_digest<'a, I>(entries: I) -> Digest
where
    I: IntoIterator<Item = (&'a str, &'a Digest)>,
{
    let mut hasher = Hasher::new();
    for (path, digest) in entries {
        hasher.update(path.as_bytes());
        hasher.update(&[0]);
        hasher.update(digest.as_bytes());
    }
    hasher.finalize()
}

/// Combine several aggregate digests (e.g. one per input tree) in order.
pub fn combine_digests<'a, I>(digests: I) -> Digest
where
    I: IntoIterator<Item = (&'a str, Digest)>,
{
    let mut hasher = Hasher::new();
    for (label, digest) in digests {
        hasher.update(label.as_bytes());
        hasher.update(&[0]);
        hasher.update(digest.as_bytes());
    }
    hasher.finalize()
}
