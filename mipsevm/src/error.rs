use std::fmt::{self, Display};

use ethereum_types::H256;
use preimage_trie::{PreimageError, TrieOpError};
use thiserror::Error;

/// Why an instruction can not be executed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FaultKind {
    /// The opcode (or function field) is not part of the supported ISA.
    UnknownInstruction,
    /// `div`/`divu` with a zero divisor.
    DivisionByZero,
    /// A branch or jump sits in the delay slot of another one.
    BranchInDelaySlot,
    /// `pc` is not word aligned.
    UnalignedPc,
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::UnknownInstruction => "unknown instruction",
            FaultKind::DivisionByZero => "division by zero",
            FaultKind::BranchInDelaySlot => "branch in delay slot",
            FaultKind::UnalignedPc => "unaligned pc",
        };

        write!(f, "{}", s)
    }
}

/// Errors that stop an emulator step. A failed step never changes the
/// emulator or the store.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StepError {
    /// A trie node (or an oracle preimage) the step needs is not in the
    /// store. Supplying it and retrying makes progress.
    #[error("Missing preimage {0:#x}")]
    MissingNode(H256),

    /// The instruction at `pc` can not be executed. The machine is stuck
    /// at its last well defined state.
    #[error("Halted at pc {pc:#010x} (insn: {insn:#010x}): {kind}")]
    HaltedFault {
        /// Address of the faulting instruction.
        pc: u32,
        /// The faulting instruction word.
        insn: u32,
        /// What went wrong.
        kind: FaultKind,
    },

    /// A memory trie value is not a 4 byte word.
    #[error("Memory at {addr:#010x} holds a {len} byte value instead of a word")]
    MalformedWord {
        /// The word aligned address.
        addr: u32,
        /// Length of the stored value.
        len: usize,
    },

    /// A state preimage does not decode into a state.
    #[error("State preimage {digest:#x} is malformed ({len} bytes)")]
    MalformedState {
        /// Digest of the offending preimage.
        digest: H256,
        /// Length of the preimage.
        len: usize,
    },

    /// The preimage store rejected a write.
    #[error(transparent)]
    Preimage(#[from] PreimageError),

    /// Any other trie failure.
    #[error(transparent)]
    Trie(TrieOpError),
}

impl From<TrieOpError> for StepError {
    fn from(err: TrieOpError) -> Self {
        match err {
            TrieOpError::MissingNode(digest) => StepError::MissingNode(digest),
            TrieOpError::Preimage(e) => StepError::Preimage(e),
            e => StepError::Trie(e),
        }
    }
}

impl StepError {
    /// The digest whose preimage would let a retry get further, if this is a
    /// [`StepError::MissingNode`].
    pub fn missing_node(&self) -> Option<H256> {
        match self {
            StepError::MissingNode(d) => Some(*d),
            _ => None,
        }
    }
}

/// Stores the result of emulator operations.
pub type StepResult<T> = Result<T, StepError>;
