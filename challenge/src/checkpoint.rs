//! Checkpoint files: a state digest together with every preimage needed to
//! resume execution from it.
//!
//! ```json
//! { "step": 0, "state": "0x..", "preimages": { "0x..": "<base64>", .. } }
//! ```

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use bytes::Bytes;
use ethereum_types::H256;
use log::info;
use mipsevm::{State, StepError};
use preimage_trie::{PreimageError, PreimageStore, SharedPreimages, TrieAccessor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::PreimageOracle;

/// Errors from reading, writing or capturing checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The file could not be opened, read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The file is not a valid checkpoint.
    #[error(transparent)]
    Json(#[from] serde_path_to_error::Error<serde_json::Error>),

    /// The checkpoint could not be encoded.
    #[error(transparent)]
    Encode(#[from] serde_json::Error),

    /// A preimage does not hash to the digest it is filed under.
    #[error(transparent)]
    Preimage(#[from] PreimageError),

    /// The state, or part of its memory, is not in the store.
    #[error(transparent)]
    Step(#[from] StepError),
}

mod digest {
    use ethereum_types::H256;
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(digest: &H256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dispute_common::digest_hex(digest))
    }

    pub(super) fn parse(s: &str) -> Result<H256, String> {
        let mut out = [0; 32];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut out)
            .map_err(|e| format!("bad digest {s}: {e}"))?;
        Ok(H256(out))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<H256, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(D::Error::custom)
    }
}

mod preimages {
    use std::collections::BTreeMap;

    use base64::{engine::general_purpose::STANDARD as B64, Engine};
    use bytes::Bytes;
    use ethereum_types::H256;
    use serde::{de::Error as _, ser::SerializeMap, Deserialize as _, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        preimages: &BTreeMap<H256, Bytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(preimages.len()))?;
        for (digest, bytes) in preimages {
            map.serialize_entry(&dispute_common::digest_hex(digest), &B64.encode(bytes))?;
        }
        map.end()
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<H256, Bytes>, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, v)| {
                let digest = super::digest::parse(&k).map_err(D::Error::custom)?;
                let bytes = B64
                    .decode(&v)
                    .map_err(|e| D::Error::custom(format!("bad preimage for {k}: {e}")))?;
                Ok((digest, Bytes::from(bytes)))
            })
            .collect()
    }
}

/// A state digest and the preimages needed to execute from it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Checkpoint {
    /// How many steps the state is past the golden state.
    pub step: u64,
    /// Digest of the state snapshot.
    #[serde(with = "digest")]
    pub state: H256,
    /// Preimages by digest.
    #[serde(with = "preimages")]
    pub preimages: BTreeMap<H256, Bytes>,
}

impl Checkpoint {
    /// Collects the snapshot of `state` and every node of its memory trie
    /// from `store`.
    pub fn capture(store: &PreimageStore, state: H256) -> Result<Self, CheckpointError> {
        let decoded = State::load(store, state)?;
        let mut preimages = BTreeMap::new();
        preimages.insert(state, store.get(&state)?);

        let nodes = TrieAccessor::new(store)
            .reachable_preimages(decoded.memory_root)
            .map_err(StepError::from)?;
        preimages.extend(nodes);

        info!(
            "Captured checkpoint at step {} ({:#x}, {} preimages)",
            decoded.step,
            state,
            preimages.len()
        );
        Ok(Self {
            step: decoded.step,
            state,
            preimages,
        })
    }

    /// Adds a preimage that is not part of the state itself (e.g. an input
    /// the program fetches through the oracle).
    pub fn add_preimage(&mut self, bytes: impl Into<Bytes>) -> H256 {
        let bytes = bytes.into();
        let digest = dispute_common::keccak(&bytes);
        self.preimages.insert(digest, bytes);
        digest
    }

    /// Reads a checkpoint.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CheckpointError> {
        let des = &mut serde_json::Deserializer::from_reader(reader);
        Ok(serde_path_to_error::deserialize(des)?)
    }

    /// Writes the checkpoint as pretty printed JSON.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), CheckpointError> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    /// Reads the checkpoint file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Writes the checkpoint to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.to_writer(&mut writer)?;
        writer.flush()?;

        info!("Wrote checkpoint {}", path.as_ref().display());
        Ok(())
    }

    /// Puts every preimage into `store`, verifying each one.
    pub fn fill(&self, store: &mut PreimageStore) -> Result<(), CheckpointError> {
        store.apply(self.preimages.iter().map(|(d, b)| (*d, b.clone())))?;
        Ok(())
    }

    /// Puts every preimage into a shared cache, verifying each one.
    pub fn fill_shared(&self, shared: &SharedPreimages) -> Result<(), CheckpointError> {
        shared.extend(self.preimages.iter().map(|(d, b)| (*d, b.clone())))?;
        Ok(())
    }

    /// A new store holding every preimage of the checkpoint.
    pub fn to_store(&self) -> Result<PreimageStore, CheckpointError> {
        let mut store = PreimageStore::new();
        self.fill(&mut store)?;
        Ok(store)
    }
}

impl PreimageOracle for Checkpoint {
    fn fetch(&self, digest: H256) -> Option<Bytes> {
        self.preimages.get(&digest).cloned()
    }
}
