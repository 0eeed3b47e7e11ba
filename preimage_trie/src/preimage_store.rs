//! Content-addressed storage of preimages.
//!
//! Every entry is keyed by the keccak digest of its bytes and the store
//! refuses anything else, so a value read back under a digest is always the
//! preimage of that digest. Entries are never mutated or evicted.
//!
//! A [`SharedPreimages`] cache can back many [`PreimageStore`]s at once (one
//! per dispute session). Reads fall through to it, but writes always land in
//! the store's private map, so what one session learns never changes what
//! another session sees.

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use dispute_common::keccak;
use ethereum_types::H256;
use log::trace;
use parking_lot::RwLock;
use thiserror::Error;

use crate::trie_hashing::NodePreimage;

/// Errors from inserting into or reading from a preimage store.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PreimageError {
    /// The bytes do not hash to the digest they were supplied for.
    #[error("Preimage does not match its digest (expected: {expected:#x}, actual: {actual:#x})")]
    DigestMismatch {
        /// The digest the bytes were supplied for.
        expected: H256,
        /// The digest of the supplied bytes.
        actual: H256,
    },

    /// No preimage is known for the digest.
    #[error("No preimage for digest {0:#x}")]
    NotFound(H256),

    /// Two different byte strings were stored under one digest. This can only
    /// happen if the store itself is corrupted.
    #[error("Store holds conflicting preimages for digest {0:#x}")]
    Inconsistent(H256),
}

fn verify(digest: H256, bytes: &[u8]) -> Result<(), PreimageError> {
    let actual = keccak(bytes);
    match actual == digest {
        true => Ok(()),
        false => Err(PreimageError::DigestMismatch {
            expected: digest,
            actual,
        }),
    }
}

/// An append-only preimage cache that is safe to read from many threads.
///
/// Typically holds the preimages of a checkpoint that every session of a
/// dispute host starts from.
#[derive(Debug, Default)]
pub struct SharedPreimages {
    entries: RwLock<HashMap<H256, Bytes>>,
}

impl SharedPreimages {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a verified preimage. Inserting the same preimage twice is a
    /// no-op.
    pub fn insert(&self, digest: H256, bytes: impl Into<Bytes>) -> Result<(), PreimageError> {
        let bytes = bytes.into();
        verify(digest, &bytes)?;

        let mut entries = self.entries.write();
        match entries.get(&digest) {
            Some(existing) if *existing != bytes => Err(PreimageError::Inconsistent(digest)),
            Some(_) => Ok(()),
            None => {
                entries.insert(digest, bytes);
                Ok(())
            }
        }
    }

    /// Inserts every preimage of `preimages`, stopping at the first one that
    /// is rejected.
    pub fn extend<I>(&self, preimages: I) -> Result<(), PreimageError>
    where
        I: IntoIterator<Item = NodePreimage>,
    {
        preimages
            .into_iter()
            .try_for_each(|(digest, bytes)| self.insert(digest, bytes))
    }

    /// Returns the preimage of `digest`, if cached.
    pub fn get(&self, digest: &H256) -> Option<Bytes> {
        self.entries.read().get(digest).cloned()
    }

    /// Returns `true` if the preimage of `digest` is cached.
    pub fn contains(&self, digest: &H256) -> bool {
        self.entries.read().contains_key(digest)
    }

    /// The number of cached preimages.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// A session private preimage store, optionally layered over a
/// [`SharedPreimages`] cache.
///
/// Cloning a store forks it: both copies keep reading the same shared cache,
/// but each one only sees its own local insertions from then on.
#[derive(Clone, Debug, Default)]
pub struct PreimageStore {
    shared: Option<Arc<SharedPreimages>>,
    local: HashMap<H256, Bytes>,
}

impl PreimageStore {
    /// Creates an empty store with no shared cache behind it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that reads through to `shared`.
    pub fn with_shared(shared: Arc<SharedPreimages>) -> Self {
        Self {
            shared: Some(shared),
            local: HashMap::new(),
        }
    }

    /// Stores `bytes` under `digest`.
    ///
    /// Fails with [`PreimageError::DigestMismatch`] (leaving the store as it
    /// was) if `keccak(bytes) != digest`. Storing an already known preimage
    /// again is a no-op.
    pub fn put(&mut self, digest: H256, bytes: impl Into<Bytes>) -> Result<(), PreimageError> {
        let bytes = bytes.into();
        verify(digest, &bytes)?;
        self.insert_verified(digest, bytes)
    }

    /// Stores `bytes` under their own digest and returns that digest.
    pub fn add(&mut self, bytes: impl Into<Bytes>) -> Result<H256, PreimageError> {
        let bytes = bytes.into();
        let digest = keccak(&bytes);
        self.insert_verified(digest, bytes)?;

        Ok(digest)
    }

    /// Commits a batch of preimages produced by trie writes.
    pub fn apply<I>(&mut self, staged: I) -> Result<(), PreimageError>
    where
        I: IntoIterator<Item = NodePreimage>,
    {
        staged
            .into_iter()
            .try_for_each(|(digest, bytes)| self.put(digest, bytes))
    }

    /// Returns the preimage of `digest`.
    pub fn get(&self, digest: &H256) -> Result<Bytes, PreimageError> {
        self.local
            .get(digest)
            .cloned()
            .or_else(|| self.shared.as_ref().and_then(|s| s.get(digest)))
            .ok_or(PreimageError::NotFound(*digest))
    }

    /// Returns `true` if the preimage of `digest` is known, locally or in the
    /// shared cache.
    pub fn contains(&self, digest: &H256) -> bool {
        self.local.contains_key(digest)
            || self.shared.as_ref().is_some_and(|s| s.contains(digest))
    }

    /// The number of preimages inserted into this store itself. Preimages only
    /// known to the shared cache are not counted.
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// Returns `true` if nothing was inserted into this store itself.
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// The shared cache behind this store, if any.
    pub fn shared(&self) -> Option<&Arc<SharedPreimages>> {
        self.shared.as_ref()
    }

    fn insert_verified(&mut self, digest: H256, bytes: Bytes) -> Result<(), PreimageError> {
        if let Ok(existing) = self.get(&digest) {
            return match existing == bytes {
                true => Ok(()),
                false => Err(PreimageError::Inconsistent(digest)),
            };
        }

        trace!("Storing preimage {:#x} ({} bytes)", digest, bytes.len());
        self.local.insert(digest, bytes);

        Ok(())
    }
}
