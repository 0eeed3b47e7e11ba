//! Helpers shared by the emulator integration tests.

#![allow(dead_code)]

use mipsevm::{asm::assemble, loader::load_program, Emulator, State};
use preimage_trie::PreimageStore;

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

/// Loads `program` into a fresh store and returns an emulator at its golden
/// state.
pub fn boot<I: IntoIterator<Item = u32>>(program: I) -> (PreimageStore, Emulator) {
    init_logger();
    let mut store = PreimageStore::new();
    let golden = load_program(&mut store, &assemble(program)).unwrap();
    let emu = Emulator::new(golden, &mut store).unwrap();

    (store, emu)
}

/// Steps `n` times, panicking on any error.
pub fn steps<'a>(emu: &'a mut Emulator, store: &mut PreimageStore, n: usize) -> &'a State {
    for _ in 0..n {
        emu.step(store).unwrap();
    }

    emu.state()
}
