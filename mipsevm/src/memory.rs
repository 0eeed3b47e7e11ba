//! Word addressed emulator memory stored in a trie.
//!
//! The trie key of a word is its aligned address as 4 big endian bytes and
//! the value is the word itself, also big endian. Zero words are not stored
//! at all, which keeps the root independent of the order memory was written
//! in.

use bytes::Bytes;
use ethereum_types::H256;
use preimage_trie::{NodePreimage, PreimageStore, TrieAccessor};

use crate::error::{StepError, StepResult};

/// Emulator memory rooted at one memory trie root.
///
/// Writes move the root forward and are staged until [`Memory::finish`].
#[derive(Debug)]
pub struct Memory<'a> {
    trie: TrieAccessor<'a>,
    root: H256,
}

impl<'a> Memory<'a> {
    /// Opens the memory with the given trie root.
    pub fn new(store: &'a PreimageStore, root: H256) -> Self {
        Self {
            trie: TrieAccessor::new(store),
            root,
        }
    }

    /// The current memory root, including staged writes.
    pub fn root(&self) -> H256 {
        self.root
    }

    /// Reads the word containing `addr`.
    pub fn read_word(&self, addr: u32) -> StepResult<u32> {
        let addr = addr & !3;
        match self.trie.lookup(self.root, &addr.to_be_bytes())? {
            None => Ok(0),
            Some(v) => {
                let word: [u8; 4] = v
                    .as_slice()
                    .try_into()
                    .map_err(|_| StepError::MalformedWord { addr, len: v.len() })?;

                Ok(u32::from_be_bytes(word))
            }
        }
    }

    /// Writes the word containing `addr`.
    pub fn write_word(&mut self, addr: u32, value: u32) -> StepResult<()> {
        let addr = addr & !3;
        let value = match value {
            0 => Vec::new(),
            v => v.to_be_bytes().to_vec(),
        };
        self.root = self.trie.update(self.root, &addr.to_be_bytes(), &value)?;

        Ok(())
    }

    /// Reads `len` bytes starting at `addr`.
    pub fn read_bytes(&self, addr: u32, len: usize) -> StepResult<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        let mut at = addr;
        while out.len() < len {
            let word = self.read_word(at)?.to_be_bytes();
            let skip = (at & 3) as usize;
            let take = (4 - skip).min(len - out.len());
            out.extend_from_slice(&word[skip..skip + take]);
            at = at.wrapping_add(take as u32);
        }

        Ok(out)
    }

    /// Writes `bytes` starting at `addr`. Partially covered words keep their
    /// other bytes.
    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> StepResult<()> {
        let mut at = addr;
        let mut rest = bytes;
        while !rest.is_empty() {
            let skip = (at & 3) as usize;
            let take = (4 - skip).min(rest.len());

            let mut word = match skip == 0 && take == 4 {
                true => [0; 4],
                false => self.read_word(at)?.to_be_bytes(),
            };
            word[skip..skip + take].copy_from_slice(&rest[..take]);
            self.write_word(at, u32::from_be_bytes(word))?;

            rest = &rest[take..];
            at = at.wrapping_add(take as u32);
        }

        Ok(())
    }

    /// Returns the preimage of `digest` from the store (or from what this
    /// memory staged).
    pub fn preimage(&self, digest: H256) -> StepResult<Bytes> {
        Ok(self.trie.preimage(digest)?)
    }

    /// Returns the final root and every node preimage the writes produced.
    pub fn finish(self) -> (H256, Vec<NodePreimage>) {
        (self.root, self.trie.into_staged())
    }
}
