//! Lazy access to tries whose nodes live in a [`PreimageStore`].
//!
//! A [`TrieAccessor`] only ever holds the root digest of a trie. Nodes are
//! fetched and decoded while a key is being walked, so a trie can be used
//! long before all of its preimages are known: the first node that is not
//! in the store stops the walk with [`TrieOpError::MissingNode`], and the
//! same call succeeds (or gets further) once that preimage has been `put`.
//!
//! Writes never touch the store directly. Every node preimage an update
//! produces is staged inside the accessor, where later reads through the same
//! accessor can see it, and is only committed when the caller hands
//! [`TrieAccessor::into_staged`] to [`PreimageStore::apply`]. Dropping the
//! accessor discards the writes.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use dispute_common::EMPTY_TRIE_HASH;
use ethereum_types::H256;
use log::trace;

use crate::{
    nibbles::Nibbles,
    node::Node,
    preimage_store::{PreimageError, PreimageStore},
    trie_hashing::{hash_root_with, NodePreimage},
    trie_ops::{trie_get, trie_insert, NodeResolver, TrieOpError, TrieOpResult},
};

/// Reads and writes tries backed by a [`PreimageStore`].
#[derive(Debug)]
pub struct TrieAccessor<'a> {
    store: &'a PreimageStore,
    staged: HashMap<H256, Bytes>,
}

impl<'a> TrieAccessor<'a> {
    /// Creates an accessor with nothing staged.
    pub fn new(store: &'a PreimageStore) -> Self {
        Self {
            store,
            staged: HashMap::new(),
        }
    }

    /// Gets the value stored under `key` in the trie rooted at `root`.
    pub fn lookup(&self, root: H256, key: &[u8]) -> TrieOpResult<Option<Vec<u8>>> {
        let key = Nibbles::from_bytes_be(key)?;
        trie_get(&root_node(root), key, self)
    }

    /// Inserts `value` under `key` in the trie rooted at `root` and returns
    /// the new root. An empty `value` deletes the key.
    ///
    /// On failure nothing is staged.
    pub fn update(&mut self, root: H256, key: &[u8], value: &[u8]) -> TrieOpResult<H256> {
        let key = Nibbles::from_bytes_be(key)?;
        let updated = trie_insert(root_node(root), key, value.to_vec(), &*self)?;

        let staged = &mut self.staged;
        let new_root = hash_root_with(&updated, &mut |(h, b)| {
            staged.insert(h, b);
        });
        trace!("Trie update moved root {:#x} -> {:#x}", root, new_root);

        Ok(new_root)
    }

    /// Returns the preimage of `digest`, looking at staged writes first.
    ///
    /// An unknown digest is reported as [`TrieOpError::MissingNode`], since
    /// supplying it is how the caller makes progress.
    pub fn preimage(&self, digest: H256) -> TrieOpResult<Bytes> {
        if let Some(b) = self.staged.get(&digest) {
            return Ok(b.clone());
        }

        self.store.get(&digest).map_err(|e| match e {
            PreimageError::NotFound(d) => TrieOpError::MissingNode(d),
            e => TrieOpError::Preimage(e),
        })
    }

    /// Collects the preimage of every node reachable from `root`, once per
    /// digest even where identical subtrees share it.
    ///
    /// Fails with [`TrieOpError::MissingNode`] on the first node that is not
    /// known, so this can only succeed for fully available tries.
    pub fn reachable_preimages(&self, root: H256) -> TrieOpResult<Vec<NodePreimage>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = match root == EMPTY_TRIE_HASH {
            true => Vec::new(),
            false => vec![root],
        };

        while let Some(digest) = pending.pop() {
            if !seen.insert(digest) {
                continue;
            }
            let bytes = self.preimage(digest)?;
            let node = decode(digest, &bytes)?;
            out.push((digest, bytes));
            collect_hash_refs(&node, &mut pending);
        }

        Ok(out)
    }

    /// The number of preimages staged so far.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Consumes the accessor, returning the preimages every update staged.
    pub fn into_staged(self) -> Vec<NodePreimage> {
        self.staged.into_iter().collect()
    }
}

impl NodeResolver for TrieAccessor<'_> {
    fn resolve(&self, digest: H256) -> TrieOpResult<Node> {
        if digest == EMPTY_TRIE_HASH {
            return Ok(Node::Empty);
        }

        let node = decode(digest, &self.preimage(digest)?)?;
        trace!("Resolved {} node {:#x}", node.kind(), digest);

        Ok(node)
    }
}

fn root_node(root: H256) -> Node {
    match root == EMPTY_TRIE_HASH {
        true => Node::Empty,
        false => Node::Hash(root),
    }
}

fn decode(digest: H256, bytes: &[u8]) -> TrieOpResult<Node> {
    Node::decode(bytes).map_err(|source| TrieOpError::MalformedNode { digest, source })
}

fn collect_hash_refs(node: &Node, out: &mut Vec<H256>) {
    match node {
        Node::Empty | Node::Leaf { .. } => (),
        Node::Hash(h) => out.push(*h),
        Node::Branch { children, .. } => children.iter().for_each(|c| collect_hash_refs(c, out)),
        Node::Extension { child, .. } => collect_hash_refs(child, out),
    }
}
