//! Supplying missing preimages to emulator operations.
//!
//! Emulator operations fail with [`StepError::MissingNode`] instead of
//! blocking. A [`Fetcher`] runs such an operation, pulls each missing
//! preimage from a [`PreimageOracle`], stores it and retries until the
//! operation either succeeds or fails for another reason.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use ethereum_types::H256;
use log::info;
use mipsevm::StepError;
use preimage_trie::{PreimageStore, SharedPreimages};

use crate::error::{ChallengeError, ChallengeResult};

/// A source of preimages.
///
/// `fetch` is the point where a dispute waits on the outside world. It may
/// return bytes that do not match the digest; those are rejected when stored.
pub trait PreimageOracle {
    /// Returns the preimage of `digest`, if this source has it.
    fn fetch(&self, digest: H256) -> Option<Bytes>;
}

impl PreimageOracle for PreimageStore {
    fn fetch(&self, digest: H256) -> Option<Bytes> {
        self.get(&digest).ok()
    }
}

impl PreimageOracle for SharedPreimages {
    fn fetch(&self, digest: H256) -> Option<Bytes> {
        self.get(&digest)
    }
}

impl<T: PreimageOracle + ?Sized> PreimageOracle for &T {
    fn fetch(&self, digest: H256) -> Option<Bytes> {
        (**self).fetch(digest)
    }
}

impl<T: PreimageOracle + ?Sized> PreimageOracle for Arc<T> {
    fn fetch(&self, digest: H256) -> Option<Bytes> {
        (**self).fetch(digest)
    }
}

impl fmt::Debug for dyn PreimageOracle + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PreimageOracle")
    }
}

/// An oracle that never has anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOracle;

impl PreimageOracle for NoOracle {
    fn fetch(&self, _digest: H256) -> Option<Bytes> {
        None
    }
}

/// Asks several oracles in order and returns the first answer.
#[derive(Debug, Default)]
pub struct OracleChain<'a> {
    sources: Vec<Box<dyn PreimageOracle + 'a>>,
}

impl<'a> OracleChain<'a> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `source`; it is asked after every source added before it.
    pub fn with<O: PreimageOracle + 'a>(mut self, source: O) -> Self {
        self.push(source);
        self
    }

    /// Appends `source`.
    pub fn push<O: PreimageOracle + 'a>(&mut self, source: O) {
        self.sources.push(Box::new(source));
    }

    /// The number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if the chain has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl PreimageOracle for OracleChain<'_> {
    fn fetch(&self, digest: H256) -> Option<Bytes> {
        self.sources.iter().find_map(|s| s.fetch(digest))
    }
}

/// Runs emulator operations to completion by fetching whatever preimages
/// they report missing.
#[derive(Clone, Copy, Debug)]
pub struct Fetcher<'a> {
    oracle: &'a dyn PreimageOracle,
    max_fetches: usize,
}

impl<'a> Fetcher<'a> {
    /// Creates a fetcher pulling from `oracle`, allowing at most
    /// `max_fetches` fetches per [`Fetcher::run`].
    pub fn new(oracle: &'a dyn PreimageOracle, max_fetches: usize) -> Self {
        Self {
            oracle,
            max_fetches,
        }
    }

    /// Calls `op` until it stops failing with a missing node.
    ///
    /// `op` must leave `store` untouched when it fails, which is what the
    /// emulator guarantees. A digest that is still missing right after it
    /// was supplied means the store is not keeping what it is given, and
    /// fails with [`ChallengeError::StoreInconsistent`] instead of looping.
    pub fn run<T, F>(&self, store: &mut PreimageStore, mut op: F) -> ChallengeResult<T>
    where
        F: FnMut(&mut PreimageStore) -> Result<T, StepError>,
    {
        let mut fetched = 0;
        let mut last = None;

        loop {
            let digest = match op(store) {
                Ok(v) => return Ok(v),
                Err(StepError::MissingNode(digest)) => digest,
                Err(e) => return Err(e.into()),
            };

            if last == Some(digest) {
                return Err(ChallengeError::StoreInconsistent(digest));
            }
            if fetched == self.max_fetches {
                return Err(ChallengeError::FetchLimit {
                    digest,
                    limit: self.max_fetches,
                });
            }

            let bytes = self
                .oracle
                .fetch(digest)
                .ok_or(ChallengeError::MissingNode(digest))?;
            store.put(digest, bytes)?;
            info!("Fetched preimage {:#x}", digest);

            last = Some(digest);
            fetched += 1;
        }
    }
}
