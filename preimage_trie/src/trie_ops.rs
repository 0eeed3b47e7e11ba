//! Get, insert and delete over a trie whose nodes are resolved on demand.
//!
//! Every operation takes the root as an owned or borrowed [`Node`] and a
//! [`NodeResolver`]. Whenever a [`Node::Hash`] sits on the path of the key,
//! the resolver is asked for the decoded node; if it can not produce it the
//! operation stops with [`TrieOpError::MissingNode`] carrying the digest.
//! Operations never mutate anything outside of the nodes they return, so a
//! failed operation can be retried as is once the node is available.

use std::mem;

use ethereum_types::H256;
use log::trace;
use thiserror::Error;

use crate::{
    nibbles::{BytesToNibblesError, Nibbles},
    node::{BranchChildren, Node, NodeDecodeError},
    preimage_store::PreimageError,
};

/// Stores the result of trie operations. Returns a [TrieOpError] upon
/// failure.
pub type TrieOpResult<T> = Result<T, TrieOpError>;

/// An error type for trie operation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TrieOpError {
    /// The preimage of a node on the path is not known. Supplying it and
    /// retrying the same operation makes progress.
    #[error("Trie node is unknown (hash: {0:#x})")]
    MissingNode(H256),

    /// A preimage was found but does not decode into a trie node.
    #[error("Trie node preimage is malformed (hash: {digest:#x}): {source}")]
    MalformedNode {
        /// The digest of the offending preimage.
        digest: H256,
        /// Why decoding failed.
        source: NodeDecodeError,
    },

    /// The key can not be turned into a trie path.
    #[error(transparent)]
    InvalidKey(#[from] BytesToNibblesError),

    /// The store rejected a preimage.
    #[error(transparent)]
    Preimage(#[from] PreimageError),
}

/// Something that can turn a node digest back into its decoded node.
pub trait NodeResolver {
    /// Resolves `digest`, failing with [`TrieOpError::MissingNode`] if its
    /// preimage is not available.
    fn resolve(&self, digest: H256) -> TrieOpResult<Node>;
}

/// A resolver for fully materialized tries. Reaching a `Hash` node is
/// reported as a missing node.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResolver;

impl NodeResolver for NoResolver {
    fn resolve(&self, digest: H256) -> TrieOpResult<Node> {
        Err(TrieOpError::MissingNode(digest))
    }
}

/// Gets the value stored under `key`, if any.
pub fn trie_get<R: NodeResolver + ?Sized>(
    node: &Node,
    key: Nibbles,
    resolver: &R,
) -> TrieOpResult<Option<Vec<u8>>> {
    get_intern(node, key, resolver)
}

fn get_intern<R: NodeResolver + ?Sized>(
    node: &Node,
    mut curr_nibbles: Nibbles,
    resolver: &R,
) -> TrieOpResult<Option<Vec<u8>>> {
    match node {
        Node::Empty => Ok(None),
        Node::Hash(h) => {
            let resolved = resolver.resolve(*h)?;
            get_intern(&resolved, curr_nibbles, resolver)
        }
        Node::Branch { children, value } => {
            if curr_nibbles.is_empty() {
                return Ok((!value.is_empty()).then(|| value.clone()));
            }

            let nib = curr_nibbles.pop_next_nibble_front();
            trace!("Get traversed Branch (nibble: {:x})", nib);
            get_intern(&children[nib as usize], curr_nibbles, resolver)
        }
        Node::Extension { nibbles, child } => {
            trace!("Get traversed Extension (nibbles: {})", nibbles);
            match curr_nibbles.starts_with(nibbles) {
                false => Ok(None),
                true => get_intern(
                    child,
                    curr_nibbles.truncate_n_nibbles_front(nibbles.len()),
                    resolver,
                ),
            }
        }
        Node::Leaf { nibbles, value } => {
            trace!("Get traversed Leaf (nibbles: {})", nibbles);
            Ok((*nibbles == curr_nibbles).then(|| value.clone()))
        }
    }
}

/// Inserts `value` under `key`, returning the new root node.
///
/// An empty `value` is treated as a delete, as in Ethereum tries.
pub fn trie_insert<R: NodeResolver + ?Sized>(
    node: Node,
    key: Nibbles,
    value: Vec<u8>,
    resolver: &R,
) -> TrieOpResult<Node> {
    if value.is_empty() {
        return trie_delete(node, key, resolver);
    }

    trace!("Inserting value under key {}", key);
    insert_into_trie_rec(node, key, value, resolver)
}

fn insert_into_trie_rec<R: NodeResolver + ?Sized>(
    node: Node,
    mut key: Nibbles,
    value: Vec<u8>,
    resolver: &R,
) -> TrieOpResult<Node> {
    match node {
        Node::Empty => Ok(Node::Leaf {
            nibbles: key,
            value,
        }),
        Node::Hash(h) => insert_into_trie_rec(resolver.resolve(h)?, key, value, resolver),
        Node::Branch {
            mut children,
            value: branch_value,
        } => {
            if key.is_empty() {
                return Ok(Node::Branch { children, value });
            }

            let nib = key.pop_next_nibble_front() as usize;
            let child = mem::take(&mut children[nib]);
            children[nib] = insert_into_trie_rec(child, key, value, resolver)?;

            Ok(Node::Branch {
                children,
                value: branch_value,
            })
        }
        Node::Leaf {
            nibbles,
            value: existing,
        } => {
            if nibbles == key {
                return Ok(Node::Leaf { nibbles, value });
            }

            let common = nibbles.common_prefix_len(&key);
            let mut branch = Node::empty_branch();
            branch = insert_into_trie_rec(
                branch,
                nibbles.truncate_n_nibbles_front(common),
                existing,
                resolver,
            )?;
            branch = insert_into_trie_rec(
                branch,
                key.truncate_n_nibbles_front(common),
                value,
                resolver,
            )?;

            Ok(place_behind_extension(key.get_next_nibbles(common), branch))
        }
        Node::Extension { nibbles, child } => {
            let common = nibbles.common_prefix_len(&key);
            if common == nibbles.len() {
                let child = insert_into_trie_rec(
                    *child,
                    key.truncate_n_nibbles_front(common),
                    value,
                    resolver,
                )?;
                return Ok(Node::Extension {
                    nibbles,
                    child: Box::new(child),
                });
            }

            // The new key diverges inside the extension, so it is split around
            // a new branch.
            let branch_nib = nibbles.get_nibble(common) as usize;
            let rest = nibbles.truncate_n_nibbles_front(common + 1);
            let mut children = new_branch_child_arr();
            children[branch_nib] = place_behind_extension(rest, *child);

            let branch = insert_into_trie_rec(
                Node::Branch {
                    children,
                    value: Vec::new(),
                },
                key.truncate_n_nibbles_front(common),
                value,
                resolver,
            )?;

            Ok(place_behind_extension(nibbles.get_next_nibbles(common), branch))
        }
    }
}

/// Deletes the value stored under `key` (if any), returning the new root
/// node.
///
/// The result is always canonical: branches left with a single child are
/// collapsed and extensions are merged with their child. Collapsing can
/// require resolving a sibling of the deleted node.
pub fn trie_delete<R: NodeResolver + ?Sized>(
    node: Node,
    key: Nibbles,
    resolver: &R,
) -> TrieOpResult<Node> {
    trace!("Deleting a leaf node with key {} if it exists", key);
    delete_intern(node, key, resolver)
}

fn delete_intern<R: NodeResolver + ?Sized>(
    node: Node,
    mut key: Nibbles,
    resolver: &R,
) -> TrieOpResult<Node> {
    match node {
        Node::Empty => Ok(Node::Empty),
        Node::Hash(h) => delete_intern(resolver.resolve(h)?, key, resolver),
        Node::Leaf { nibbles, value } => match nibbles == key {
            true => Ok(Node::Empty),
            false => Ok(Node::Leaf { nibbles, value }),
        },
        Node::Extension { nibbles, child } => {
            if !key.starts_with(&nibbles) {
                return Ok(Node::Extension { nibbles, child });
            }

            let child = delete_intern(
                *child,
                key.truncate_n_nibbles_front(nibbles.len()),
                resolver,
            )?;
            Ok(collapse_ext_node_if_needed(nibbles, child))
        }
        Node::Branch {
            mut children,
            mut value,
        } => {
            if key.is_empty() {
                value.clear();
            } else {
                let nib = key.pop_next_nibble_front() as usize;
                let child = mem::take(&mut children[nib]);
                children[nib] = delete_intern(child, key, resolver)?;
            }

            collapse_branch_if_needed(children, value, resolver)
        }
    }
}

fn collapse_ext_node_if_needed(nibbles: Nibbles, child: Node) -> Node {
    match child {
        Node::Empty => Node::Empty,
        Node::Leaf {
            nibbles: child_nibbles,
            value,
        } => Node::Leaf {
            nibbles: nibbles.merge_nibbles(&child_nibbles),
            value,
        },
        Node::Extension {
            nibbles: child_nibbles,
            child,
        } => Node::Extension {
            nibbles: nibbles.merge_nibbles(&child_nibbles),
            child,
        },
        // An extension always points to a branch, so an unresolved child
        // can stay unresolved.
        child @ (Node::Branch { .. } | Node::Hash(_)) => Node::Extension {
            nibbles,
            child: Box::new(child),
        },
    }
}

fn collapse_branch_if_needed<R: NodeResolver + ?Sized>(
    mut children: BranchChildren,
    value: Vec<u8>,
    resolver: &R,
) -> TrieOpResult<Node> {
    let mut non_empty = children
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_empty())
        .map(|(i, _)| i);
    let first = non_empty.next();
    let more_than_one = non_empty.next().is_some();

    match (first, more_than_one, value.is_empty()) {
        (None, _, true) => Ok(Node::Empty),
        (None, _, false) => Ok(Node::Leaf {
            nibbles: Nibbles::default(),
            value,
        }),
        (Some(idx), false, true) => {
            let only_child = match mem::take(&mut children[idx]) {
                Node::Hash(h) => resolver.resolve(h)?,
                n => n,
            };
            let prefix = Nibbles::from_nibble(idx as u8);

            Ok(match only_child {
                Node::Branch { .. } => Node::Extension {
                    nibbles: prefix,
                    child: Box::new(only_child),
                },
                other => collapse_ext_node_if_needed(prefix, other),
            })
        }
        _ => Ok(Node::Branch { children, value }),
    }
}

fn place_behind_extension(nibbles: Nibbles, node: Node) -> Node {
    match nibbles.is_empty() {
        true => node,
        false => collapse_ext_node_if_needed(nibbles, node),
    }
}

fn new_branch_child_arr() -> BranchChildren {
    Box::new(std::array::from_fn(|_| Node::Empty))
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use ethereum_types::H256;

    use super::{trie_delete, trie_get, trie_insert, NoResolver, NodeResolver, TrieOpError};
    use crate::{
        builder::TrieBuilder,
        nibbles::Nibbles,
        node::Node,
        testing_utils::{
            common_setup, entry, generate_n_random_word_entries, large_entry, TestInsertValEntry,
        },
        trie_hashing::{hash_root_with, hash_trie},
    };

    fn key(k: &[u8]) -> Nibbles {
        Nibbles::from_bytes_be(k).unwrap()
    }

    fn build(entries: &[TestInsertValEntry]) -> Node {
        entries.iter().fold(Node::Empty, |n, (k, v)| {
            trie_insert(n, key(k), v.clone(), &NoResolver).unwrap()
        })
    }

    fn assert_all_entries_in_trie(entries: &[TestInsertValEntry], trie: &Node) {
        for (k, v) in entries {
            assert_eq!(
                trie_get(trie, key(k), &NoResolver).unwrap().as_ref(),
                Some(v),
                "key {}",
                hex::encode(k)
            );
        }
    }

    /// Resolver over the preimages emitted when hashing a materialized trie.
    struct MapResolver(HashMap<H256, bytes::Bytes>);

    impl NodeResolver for MapResolver {
        fn resolve(&self, digest: H256) -> super::TrieOpResult<Node> {
            let bytes = self
                .0
                .get(&digest)
                .ok_or(TrieOpError::MissingNode(digest))?;
            Ok(Node::decode(bytes).unwrap())
        }
    }

    fn hashed(trie: &Node) -> (H256, MapResolver) {
        let mut preimages = HashMap::new();
        let root = hash_root_with(trie, &mut |(h, b)| {
            preimages.insert(h, b);
        });

        (root, MapResolver(preimages))
    }

    #[test]
    fn single_insert() {
        common_setup();
        let entries = [entry(0x1234)];
        assert_all_entries_in_trie(&entries, &build(&entries));
    }

    #[test]
    fn inserts_that_share_nibbles_work() {
        common_setup();
        let entries = [
            entry(0x1234_5678),
            entry(0x1234_5679),
            entry(0x1234_0000),
            entry(0x2000_0000),
        ];
        assert_all_entries_in_trie(&entries, &build(&entries));
    }

    #[test]
    fn updating_an_existing_key_replaces_the_value() {
        common_setup();
        let mut trie = build(&[entry(0x1234)]);
        trie = trie_insert(trie, key(&0x1234u32.to_be_bytes()), vec![9], &NoResolver).unwrap();

        assert_eq!(
            trie_get(&trie, key(&0x1234u32.to_be_bytes()), &NoResolver).unwrap(),
            Some(vec![9])
        );
    }

    #[test]
    fn variable_length_keys_use_branch_values() {
        common_setup();
        let entries = vec![
            (vec![0x12], vec![1]),
            (vec![0x12, 0x34], vec![2]),
            (vec![0x12, 0x34, 0x56], vec![3]),
        ];
        let trie = build(&entries);
        assert_all_entries_in_trie(&entries, &trie);

        let trie = trie_delete(trie, key(&[0x12, 0x34]), &NoResolver).unwrap();
        assert_all_entries_in_trie(&[entries[0].clone(), entries[2].clone()], &trie);
        assert_eq!(hash_trie(&trie), hash_trie(&build(&[entries[0].clone(), entries[2].clone()])));
    }

    #[test]
    fn missing_keys_return_none() {
        common_setup();
        let trie = build(&[entry(0x1234_5678), entry(0x1234_9999)]);
        for k in [0x1234_5679u32, 0x1200_0000, 0xffff_ffff] {
            assert_eq!(trie_get(&trie, key(&k.to_be_bytes()), &NoResolver).unwrap(), None);
        }
    }

    #[test]
    fn deleting_everything_yields_the_empty_trie() {
        common_setup();
        let entries: Vec<_> = generate_n_random_word_entries(200, 5).collect();
        let trie = entries
            .iter()
            .fold(build(&entries), |n, (k, _)| trie_delete(n, key(k), &NoResolver).unwrap());

        assert_eq!(trie, Node::Empty);
    }

    #[test]
    fn deletes_leave_a_canonical_trie() {
        common_setup();
        let entries: Vec<_> = generate_n_random_word_entries(400, 9).collect();
        let (removed, kept) = entries.split_at(150);

        let mut trie = build(&entries);
        for (k, _) in removed {
            trie = trie_delete(trie, key(k), &NoResolver).unwrap();
        }

        assert_eq!(hash_trie(&trie), hash_trie(&build(kept)));
        assert_all_entries_in_trie(kept, &trie);
    }

    #[test]
    fn lazy_get_resolves_only_the_path() {
        common_setup();
        let entries: Vec<_> = generate_n_random_word_entries(100, 13).collect();
        let (root, resolver) = hashed(&build(&entries));

        for (k, v) in &entries {
            assert_eq!(
                trie_get(&Node::Hash(root), key(k), &resolver).unwrap(),
                Some(v.clone())
            );
        }
    }

    #[test]
    fn lazy_get_reports_the_unresolved_root() {
        common_setup();
        let root = H256::repeat_byte(0x42);
        assert_eq!(
            trie_get(&Node::Hash(root), key(&[1, 2, 3, 4]), &NoResolver),
            Err(TrieOpError::MissingNode(root))
        );
    }

    #[test]
    fn lazy_insert_and_delete_agree_with_materialized_trie() {
        common_setup();
        let entries: Vec<_> = generate_n_random_word_entries(120, 17).collect();
        let (root, resolver) = hashed(&build(&entries));

        let extra = large_entry(0x0bad_f00d);
        let lazy = trie_insert(Node::Hash(root), key(&extra.0), extra.1.clone(), &resolver).unwrap();
        let mut all = entries.clone();
        all.push(extra);
        assert_eq!(hash_trie(&lazy), hash_trie(&build(&all)));

        let lazy = trie_delete(Node::Hash(root), key(&entries[0].0), &resolver).unwrap();
        assert_eq!(hash_trie(&lazy), hash_trie(&build(&entries[1..])));
    }

    #[test]
    fn lazy_delete_needs_the_sibling_to_collapse() {
        common_setup();
        // Two large leaves under one branch: deleting one forces the other to
        // move up, which needs its preimage.
        let a = large_entry(0x1000_0000);
        let b = large_entry(0x2000_0000);
        let (root, MapResolver(mut preimages)) = hashed(&build(&[a.clone(), b]));

        let Node::Branch { children, .. } = Node::decode(&preimages[&root]).unwrap() else {
            panic!("expected the root to be a branch");
        };
        let Node::Hash(sibling_ref) = children[2].clone() else {
            panic!("expected a hashed sibling");
        };
        preimages.remove(&sibling_ref);

        let resolver = MapResolver(preimages);
        assert_eq!(
            trie_delete(Node::Hash(root), key(&a.0), &resolver),
            Err(TrieOpError::MissingNode(sibling_ref))
        );
    }

    #[test]
    fn inserting_the_same_entries_in_any_order_gives_the_same_root() {
        common_setup();
        let entries: Vec<_> = generate_n_random_word_entries(64, 23).collect();
        let mut reversed = entries.clone();
        reversed.reverse();

        let roots: HashSet<_> = [
            hash_trie(&build(&entries)),
            hash_trie(&build(&reversed)),
            TrieBuilder::from_entries(entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())))
                .unwrap()
                .root_hash(),
        ]
        .into_iter()
        .collect();

        assert_eq!(roots.len(), 1);
    }
}
