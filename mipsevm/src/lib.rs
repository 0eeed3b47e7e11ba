//! A deterministic MIPS32 (big endian) emulator that executes one
//! instruction at a time over memory held in a lazily resolved Merkle
//! Patricia trie.
//!
//! Every state has a digest (see [`state`]) and stepping from one state
//! always produces the same next digest, which is what makes it possible to
//! bisect over two competing execution traces. Memory is only as available as
//! the preimages in the backing [`PreimageStore`][preimage_trie::PreimageStore];
//! a step that touches an unknown node fails with
//! [`StepError::MissingNode`] and leaves everything untouched, so the caller
//! can fetch the node and simply step again.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod asm;
mod emulator;
mod error;
pub mod isa;
pub mod loader;
pub mod memory;
pub mod state;

pub use emulator::{Emulator, StopReason, Trace};
pub use error::{FaultKind, StepError, StepResult};
pub use state::State;
