//! Getting programs and their inputs into memory, and results out of it.

use ethereum_types::H256;
use log::info;
use preimage_trie::{PreimageStore, TrieBuilder};

use crate::{error::StepResult, memory::Memory, state::State};

/// Where the digest of the program input is placed.
pub const INPUT_ADDR: u32 = 0x3000_0000;

/// Where a program that finished successfully writes [`OUTPUT_MAGIC`],
/// followed by [`OUTPUT_LEN`] bytes of output.
pub const OUTPUT_ADDR: u32 = 0x3000_0800;

/// Marks a valid output.
pub const OUTPUT_MAGIC: u32 = 0x1337_f00d;

/// Length of the output following the magic.
pub const OUTPUT_LEN: usize = 64;

/// Maps `program` at address 0 and returns the state before its first
/// instruction (the golden state).
///
/// The whole memory trie and the state snapshot are put into `store`.
pub fn load_program(store: &mut PreimageStore, program: &[u8]) -> StepResult<State> {
    let mut builder = TrieBuilder::new();
    for (i, chunk) in program.chunks(4).enumerate() {
        let mut word = [0; 4];
        word[..chunk.len()].copy_from_slice(chunk);

        if word != [0; 4] {
            builder.insert(&((i * 4) as u32).to_be_bytes(), &word)?;
        }
    }

    let (root, preimages) = builder.finish();
    store.apply(preimages)?;

    let state = State::golden(root);
    let digest = state.store(store)?;
    info!(
        "Loaded {} byte program (memory root: {:#x}, state: {:#x})",
        program.len(),
        root,
        digest
    );

    Ok(state)
}

/// Writes `data` at `addr` into the memory of `state` and returns the
/// updated state.
///
/// Only the nodes on the written paths are needed, so this can fail with a
/// missing node when `store` only partially knows the memory.
pub fn write_data(
    store: &mut PreimageStore,
    state: &State,
    addr: u32,
    data: &[u8],
) -> StepResult<State> {
    let mut mem = Memory::new(store, state.memory_root);
    mem.write_bytes(addr, data)?;
    let (root, staged) = mem.finish();

    store.apply(staged)?;
    let updated = State {
        memory_root: root,
        ..state.clone()
    };
    updated.store(store)?;

    Ok(updated)
}

/// Stores `input` as a preimage and places its digest at [`INPUT_ADDR`],
/// where the program picks it up to query the preimage oracle.
pub fn seed_input(store: &mut PreimageStore, state: &State, input: &[u8]) -> StepResult<State> {
    let digest: H256 = store.add(input.to_vec())?;
    write_data(store, state, INPUT_ADDR, digest.as_bytes())
}

/// Returns the output of a program that wrote one.
pub fn read_output(store: &PreimageStore, state: &State) -> StepResult<Option<Vec<u8>>> {
    let mem = Memory::new(store, state.memory_root);
    if mem.read_word(OUTPUT_ADDR)? != OUTPUT_MAGIC {
        return Ok(None);
    }

    Ok(Some(mem.read_bytes(OUTPUT_ADDR + 4, OUTPUT_LEN)?))
}

#[cfg(test)]
mod tests {
    use dispute_common::keccak;
    use preimage_trie::PreimageStore;

    use super::{load_program, read_output, seed_input, write_data, INPUT_ADDR, OUTPUT_ADDR};
    use crate::{memory::Memory, state::State};

    #[test]
    fn program_words_land_at_their_addresses() {
        let mut store = PreimageStore::new();
        let state = load_program(&mut store, &[1, 2, 3, 4, 0, 0, 0, 0, 9, 8]).unwrap();

        let mem = Memory::new(&store, state.memory_root);
        assert_eq!(mem.read_word(0).unwrap(), 0x0102_0304);
        assert_eq!(mem.read_word(4).unwrap(), 0);
        assert_eq!(mem.read_word(8).unwrap(), 0x0908_0000);
        assert_eq!(State::load(&store, state.digest()).unwrap(), state);
    }

    #[test]
    fn input_digest_is_placed_at_the_input_address() {
        let mut store = PreimageStore::new();
        let golden = load_program(&mut store, &[0, 0, 0, 0x0c]).unwrap();

        let seeded = seed_input(&mut store, &golden, b"header bytes").unwrap();

        let mem = Memory::new(&store, seeded.memory_root);
        assert_eq!(
            mem.read_bytes(INPUT_ADDR, 32).unwrap(),
            keccak(b"header bytes").as_bytes()
        );
        assert_eq!(store.get(&keccak(b"header bytes")).unwrap(), &b"header bytes"[..]);
        assert_eq!(seeded.pc, golden.pc);
    }

    #[test]
    fn output_requires_the_magic() {
        let mut store = PreimageStore::new();
        let golden = load_program(&mut store, &[0, 0, 0, 0x0c]).unwrap();
        assert_eq!(read_output(&store, &golden).unwrap(), None);

        let mut out = vec![0x13, 0x37, 0xf0, 0x0d];
        out.extend((0..64).map(|i| i as u8));
        let done = write_data(&mut store, &golden, OUTPUT_ADDR, &out).unwrap();

        assert_eq!(read_output(&store, &done).unwrap(), Some(out[4..].to_vec()));
    }
}
