use ethereum_types::H256;

/// The hash of an empty Merkle Patricia trie.
/// 0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421
pub const EMPTY_TRIE_HASH: H256 = H256([
    86, 232, 31, 23, 27, 204, 85, 166, 255, 131, 69, 230, 146, 192, 248, 110, 91, 72, 224, 27, 153,
    108, 173, 192, 1, 98, 47, 181, 227, 99, 180, 33,
]);

/// Length in bytes of every digest used by the dispute engine.
pub const DIGEST_LEN: usize = 32;

/// Keccak-256 of `bytes`.
///
/// Every content address in the system (trie nodes, state snapshots, oracle
/// preimages) is computed with this function.
pub fn keccak<T: AsRef<[u8]>>(bytes: T) -> H256 {
    keccak_hash::keccak(bytes.as_ref())
}

/// Renders a digest as a `0x`-prefixed lowercase hex string without the
/// ellipsis `Display` inserts for `H256`.
pub fn digest_hex(digest: &H256) -> String {
    format!("{digest:#x}")
}

#[test]
fn test_empty_trie_hash() {
    assert_eq!(
        EMPTY_TRIE_HASH,
        keccak(bytes::Bytes::from_static(&rlp::NULL_RLP))
    );
}

#[test]
fn test_digest_hex_is_full_width() {
    let s = digest_hex(&EMPTY_TRIE_HASH);
    assert_eq!(s.len(), 2 + 2 * DIGEST_LEN);
    assert!(s.starts_with("0x56e81f17"));
}
