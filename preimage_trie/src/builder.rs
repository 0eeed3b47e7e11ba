//! A builder for fully materialized tries.

use std::mem;

use ethereum_types::H256;

use crate::{
    nibbles::Nibbles,
    node::Node,
    trie_hashing::{hash_root_with, hash_trie, NodePreimage},
    trie_ops::{trie_get, trie_insert, NoResolver, TrieOpResult},
};

#[derive(Clone, Debug, Default)]
/// Builds a trie entirely in memory and hands out its root together with
/// every node preimage needed to walk it lazily later on.
///
/// Used wherever a trie is created from scratch, such as when a program is
/// first mapped into emulator memory.
pub struct TrieBuilder {
    root: Node,
}

impl TrieBuilder {
    /// Creates a builder for an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder holding all of `entries`.
    pub fn from_entries<'a, I>(entries: I) -> TrieOpResult<Self>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let mut builder = Self::new();
        for (k, v) in entries {
            builder.insert(k, v)?;
        }

        Ok(builder)
    }

    /// Inserts `value` under `key`. An empty value deletes the key.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> TrieOpResult<()> {
        let key = Nibbles::from_bytes_be(key)?;
        let root = mem::take(&mut self.root);
        self.root = trie_insert(root, key, value.to_vec(), &NoResolver)?;

        Ok(())
    }

    /// Gets the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> TrieOpResult<Option<Vec<u8>>> {
        trie_get(&self.root, Nibbles::from_bytes_be(key)?, &NoResolver)
    }

    /// The root node of the trie built so far.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The hash of the trie built so far.
    pub fn root_hash(&self) -> H256 {
        hash_trie(&self.root)
    }

    /// Consumes the builder, returning the root hash and the preimage of
    /// every node that is referenced by hash (including the root).
    pub fn finish(self) -> (H256, Vec<NodePreimage>) {
        let mut preimages = Vec::new();
        let root = hash_root_with(&self.root, &mut |p| preimages.push(p));

        (root, preimages)
    }
}
