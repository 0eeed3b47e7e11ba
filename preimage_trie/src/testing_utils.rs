use std::iter::{once, repeat};

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

/// Keeps random variable length keys long enough that collisions (which
/// would make "every inserted value is retrievable" checks fail) are
/// practically impossible.
const MIN_BYTES_FOR_VAR_KEY: usize = 5;

/// `(key bytes, value)`.
pub(crate) type TestInsertValEntry = (Vec<u8>, Vec<u8>);

pub(crate) fn common_setup() {
    // Try init since multiple tests calling `init` will cause an error.
    let _ = pretty_env_logger::try_init();
}

pub(crate) fn entry(k: u32) -> TestInsertValEntry {
    (k.to_be_bytes().to_vec(), vec![2])
}

/// Needed when a node must be referenced by hash, which requires its RLP
/// encoding to be >= 32 bytes.
pub(crate) fn large_entry(k: u32) -> TestInsertValEntry {
    (
        k.to_be_bytes().to_vec(),
        once(2).chain(repeat(255).take(32)).collect(),
    )
}

/// Entries shaped like emulator memory: 4 byte keys and non zero 4 byte
/// values. Keys are unique.
pub(crate) fn generate_n_random_word_entries(
    n: usize,
    seed: u64,
) -> impl Iterator<Item = TestInsertValEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = std::collections::HashSet::new();

    std::iter::from_fn(move || loop {
        let k: u32 = rng.gen::<u32>() & !3;
        if seen.insert(k) {
            let v: u32 = rng.gen_range(1..=u32::MAX);
            return Some((k.to_be_bytes().to_vec(), v.to_be_bytes().to_vec()));
        }
    })
    .take(n)
}

/// Fixed length 32 byte keys with 32 byte values.
pub(crate) fn generate_n_random_fixed_trie_value_entries(
    n: usize,
    seed: u64,
) -> impl Iterator<Item = TestInsertValEntry> {
    gen_n_random_trie_value_entries_common(n, seed, |rng| gen_rand_bytes(rng, 32), |rng| {
        gen_rand_bytes(rng, 32)
    })
}

/// Keys between 5 and 32 bytes long with values of up to 64 bytes. Keys of
/// different lengths exercise branch values.
pub(crate) fn generate_n_random_variable_trie_value_entries(
    n: usize,
    seed: u64,
) -> impl Iterator<Item = TestInsertValEntry> {
    gen_n_random_trie_value_entries_common(n, seed, gen_variable_key, |rng| {
        let len = rng.gen_range(1..=64);
        gen_rand_bytes(rng, len)
    })
}

fn gen_n_random_trie_value_entries_common<
    K: Fn(&mut StdRng) -> Vec<u8>,
    V: Fn(&mut StdRng) -> Vec<u8>,
>(
    n: usize,
    seed: u64,
    key_gen_f: K,
    val_gen_f: V,
) -> impl Iterator<Item = TestInsertValEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(move |_| (key_gen_f(&mut rng), val_gen_f(&mut rng)))
}

fn gen_variable_key(rng: &mut StdRng) -> Vec<u8> {
    let n_bytes = rng.gen_range(MIN_BYTES_FOR_VAR_KEY..=32);
    gen_rand_bytes(rng, n_bytes)
}

fn gen_rand_bytes(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let mut buf = vec![0; len];
    rng.fill_bytes(&mut buf);

    buf
}
