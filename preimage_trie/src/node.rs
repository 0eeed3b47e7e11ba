//! The decoded, structural form of a trie node preimage.
//!
//! Nodes only live for as long as a trie operation needs them. A child that
//! has not been looked at yet is kept as [`Node::Hash`]; resolving it means
//! fetching its preimage from the store and calling [`Node::decode`].

use ethereum_types::H256;
use rlp::{DecoderError, Rlp};

use crate::nibbles::{FromHexPrefixError, Nibbles};

/// Children of a branch node.
pub type BranchChildren = Box<[Node; 16]>;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
/// A node of a Merkle Patricia trie. This mimics the structure of an
/// Ethereum trie, except with an additional `Hash` node type, representing a
/// node whose preimage has not been resolved yet.
pub enum Node {
    /// An empty trie.
    #[default]
    Empty,
    /// The digest of a node that has not been resolved.
    ///
    /// **Important note**: Hash nodes only ever stand in for nodes whose RLP
    /// encoding is >= 32 bytes. Smaller nodes are always inlined into their
    /// parent and decoded together with it.
    Hash(H256),
    /// A branch node, which consists of 16 children and an optional value.
    Branch {
        /// The 16 children of this branch node.
        children: BranchChildren,
        /// The payload of this node. Empty when absent.
        value: Vec<u8>,
    },
    /// An extension node, which consists of a list of nibbles and a single
    /// child.
    Extension {
        /// The path of this extension.
        nibbles: Nibbles,
        /// The child of this extension node.
        child: Box<Node>,
    },
    /// A leaf node, which consists of a list of nibbles and a value.
    Leaf {
        /// The path of this leaf node.
        nibbles: Nibbles,
        /// The payload of this node.
        value: Vec<u8>,
    },
}

#[derive(Clone, Debug, thiserror::Error, PartialEq)]
/// Reasons a preimage can not be decoded into a [`Node`].
pub enum NodeDecodeError {
    #[error("invalid rlp: {0}")]
    /// The bytes are not valid RLP.
    Rlp(#[from] DecoderError),

    #[error("invalid key path: {0}")]
    /// The hex prefix encoded path of a leaf or extension is invalid.
    Path(#[from] FromHexPrefixError),

    #[error("a node must be a list of 2 or 17 items (found {0})")]
    /// The node list has the wrong arity.
    BadItemCount(usize),

    #[error("a child reference must be empty, a 32 byte digest or an inline node (found {0} bytes)")]
    /// A child reference has an impossible length.
    BadChildRef(usize),
}

impl Node {
    /// A short lowercase label for the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Empty => "empty",
            Node::Hash(_) => "hash",
            Node::Branch { .. } => "branch",
            Node::Extension { .. } => "extension",
            Node::Leaf { .. } => "leaf",
        }
    }

    /// Creates a branch with no children and no value.
    pub fn empty_branch() -> Self {
        Node::Branch {
            children: Box::new(std::array::from_fn(|_| Node::Empty)),
            value: Vec::new(),
        }
    }

    /// Returns `true` for [`Node::Empty`].
    pub const fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    /// Decodes a node from its RLP encoding.
    ///
    /// Both standalone preimages and inline children go through here; an
    /// empty RLP string decodes to [`Node::Empty`].
    pub fn decode(bytes: &[u8]) -> Result<Self, NodeDecodeError> {
        decode_rlp(&Rlp::new(bytes))
    }
}

fn decode_rlp(rlp: &Rlp) -> Result<Node, NodeDecodeError> {
    if rlp.is_data() {
        return match rlp.data()?.is_empty() {
            true => Ok(Node::Empty),
            false => Err(NodeDecodeError::Rlp(DecoderError::RlpExpectedToBeList)),
        };
    }

    match rlp.item_count()? {
        17 => {
            let mut children: BranchChildren = Box::new(std::array::from_fn(|_| Node::Empty));
            for (i, child) in children.iter_mut().enumerate() {
                *child = decode_child_ref(&rlp.at(i)?)?;
            }
            let value = rlp.at(16)?.data()?.to_vec();

            Ok(Node::Branch { children, value })
        }
        2 => {
            let (nibbles, is_leaf) = Nibbles::from_hex_prefix_encoding(rlp.at(0)?.data()?)?;
            let second = rlp.at(1)?;

            match is_leaf {
                true => Ok(Node::Leaf {
                    nibbles,
                    value: second.data()?.to_vec(),
                }),
                false => Ok(Node::Extension {
                    nibbles,
                    child: Box::new(decode_child_ref(&second)?),
                }),
            }
        }
        n => Err(NodeDecodeError::BadItemCount(n)),
    }
}

fn decode_child_ref(rlp: &Rlp) -> Result<Node, NodeDecodeError> {
    if rlp.is_list() {
        return decode_rlp(rlp);
    }

    let data = rlp.data()?;
    match data.len() {
        0 => Ok(Node::Empty),
        32 => Ok(Node::Hash(H256::from_slice(data))),
        n => Err(NodeDecodeError::BadChildRef(n)),
    }
}

#[cfg(test)]
mod tests {
    use ethereum_types::H256;

    use super::{Node, NodeDecodeError};
    use crate::{nibbles::Nibbles, trie_hashing::encode_node_raw};

    fn leaf(nibs: &[u8], value: &[u8]) -> Node {
        Node::Leaf {
            nibbles: Nibbles::from_nibble_slice(nibs),
            value: value.to_vec(),
        }
    }

    #[test]
    fn empty_string_decodes_to_empty_node() {
        assert_eq!(Node::decode(&rlp::NULL_RLP).unwrap(), Node::Empty);
    }

    #[test]
    fn leaf_round_trips_through_encoding() {
        let n = leaf(&[1, 2, 3], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(Node::decode(&encode_node_raw(&n)).unwrap(), n);
    }

    #[test]
    fn branch_keeps_inline_and_hashed_children_apart() {
        let mut branch = Node::empty_branch();
        if let Node::Branch { children, .. } = &mut branch {
            children[0] = leaf(&[1], &[7]);
            children[15] = Node::Hash(H256::repeat_byte(0xab));
        }
        let decoded = Node::decode(&encode_node_raw(&branch)).unwrap();

        let Node::Branch { children, value } = decoded else {
            panic!("expected a branch");
        };
        assert!(value.is_empty());
        assert_eq!(children[0], leaf(&[1], &[7]));
        assert_eq!(children[15], Node::Hash(H256::repeat_byte(0xab)));
        assert!(children[1..15].iter().all(Node::is_empty));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let mut s = rlp::RlpStream::new_list(3);
        s.append_empty_data().append_empty_data().append_empty_data();

        assert_eq!(
            Node::decode(&s.out()),
            Err(NodeDecodeError::BadItemCount(3))
        );
    }

    #[test]
    fn short_child_digest_is_rejected() {
        let mut s = rlp::RlpStream::new_list(2);
        s.append(&Nibbles::from_nibble(1).to_hex_prefix_encoding(false).as_ref());
        s.append(&vec![0u8; 5]);

        assert_eq!(Node::decode(&s.out()), Err(NodeDecodeError::BadChildRef(5)));
    }
}
