//! Content-addressed preimage storage and lazily resolved Ethereum Merkle
//! Patricia tries on top of it.
//!
//! Unlike general purpose trie libraries (such as [eth_trie](https://docs.rs/eth_trie)),
//! the tries here never need to be complete. Only a root digest is held, and
//! nodes are pulled out of a [`PreimageStore`][preimage_store::PreimageStore]
//! while a key is being walked. When a node is not available the operation
//! fails with [`MissingNode`][trie_ops::TrieOpError::MissingNode] naming the
//! exact digest that is needed, which lets a caller discover the working set
//! of a computation one node at a time.
//!
//! The main entry point is [`TrieAccessor`][accessor::TrieAccessor].

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod accessor;
pub mod builder;
pub mod nibbles;
pub mod node;
pub mod preimage_store;
mod trie_hashing;
pub mod trie_ops;

#[cfg(test)]
pub(crate) mod testing_utils;

pub use accessor::TrieAccessor;
pub use builder::TrieBuilder;
pub use preimage_store::{PreimageError, PreimageStore, SharedPreimages};
pub use trie_hashing::{hash_trie, NodePreimage};
pub use trie_ops::{TrieOpError, TrieOpResult};
