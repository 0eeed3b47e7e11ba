use bytes::Bytes;
use dispute_common::keccak;
use ethereum_types::H256;
use rlp::RlpStream;

use crate::node::Node;

/// The node type used for calculating the hash of a trie.
#[derive(Clone, Debug, Hash)]
pub(crate) enum EncodedNode {
    /// Node that is RLPed but not hashed.
    Raw(Bytes),
    /// Node that is hashed.
    Hashed(H256),
}

/// A preimage produced while hashing a trie, ready to be put into a store.
pub type NodePreimage = (H256, Bytes);

/// Hashes `node` as the root of a trie, handing every hashed node preimage
/// (including the root's, even when it is shorter than 32 bytes) to `sink`.
///
/// `Hash` nodes are referenced by digest and never descended into, so only
/// materialized nodes produce preimages.
pub(crate) fn hash_root_with<F: FnMut(NodePreimage)>(node: &Node, sink: &mut F) -> H256 {
    match encode_and_hash_node(node, sink) {
        EncodedNode::Hashed(h) => h,
        EncodedNode::Raw(b) => {
            let h = keccak(&b);
            sink((h, b));
            h
        }
    }
}

/// Hashes `node` as a trie root, discarding the produced preimages.
pub fn hash_trie(node: &Node) -> H256 {
    hash_root_with(node, &mut |_| ())
}

/// The full RLP encoding of a single node, with its children referenced the
/// same way its parent would see them.
#[cfg(test)]
pub(crate) fn encode_node_raw(node: &Node) -> Bytes {
    encode_node_with(node, &mut |_| ())
}

fn encode_and_hash_node<F: FnMut(NodePreimage)>(node: &Node, sink: &mut F) -> EncodedNode {
    match node {
        Node::Hash(h) => EncodedNode::Hashed(*h),
        _ => hash_bytes_if_large_enough(encode_node_with(node, sink), sink),
    }
}

fn encode_node_with<F: FnMut(NodePreimage)>(node: &Node, sink: &mut F) -> Bytes {
    match node {
        Node::Empty => Bytes::from_static(&rlp::NULL_RLP),
        Node::Hash(h) => Bytes::copy_from_slice(h.as_bytes()),
        Node::Branch { children, value } => {
            let mut stream = RlpStream::new_list(17);

            for c in children.iter() {
                append_to_stream(&mut stream, encode_and_hash_node(c, sink));
            }

            match value.is_empty() {
                false => stream.append(value),
                true => stream.append_empty_data(),
            };

            stream.out().freeze()
        }
        Node::Extension { nibbles, child } => {
            let mut stream = RlpStream::new_list(2);

            stream.append(&nibbles.to_hex_prefix_encoding(false));
            append_to_stream(&mut stream, encode_and_hash_node(child, sink));

            stream.out().freeze()
        }
        Node::Leaf { nibbles, value } => {
            let mut stream = RlpStream::new_list(2);

            stream.append(&nibbles.to_hex_prefix_encoding(true));
            stream.append(value);

            stream.out().freeze()
        }
    }
}

fn hash_bytes_if_large_enough<F: FnMut(NodePreimage)>(bytes: Bytes, sink: &mut F) -> EncodedNode {
    match bytes.len() >= 32 {
        false => EncodedNode::Raw(bytes),
        true => {
            let h = keccak(&bytes);
            sink((h, bytes));
            EncodedNode::Hashed(h)
        }
    }
}

fn append_to_stream(s: &mut RlpStream, node: EncodedNode) {
    match node {
        EncodedNode::Raw(b) => s.append_raw(&b, 1),
        EncodedNode::Hashed(h) => s.append(&h.as_bytes()),
    };
}
