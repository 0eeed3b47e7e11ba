use ethereum_types::H256;
use log::debug;
use preimage_trie::PreimageStore;

use crate::{
    error::{StepError, StepResult},
    isa::execute,
    memory::Memory,
    state::State,
};

/// Why [`Emulator::run`] stopped.
#[derive(Clone, Debug, PartialEq)]
pub enum StopReason {
    /// All requested steps were executed.
    Completed,
    /// The program exited.
    Exited,
    /// A step failed. The trace ends at the last successful step.
    Interrupted(StepError),
}

/// The digests a run went through.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    /// Digest of the state the run started from.
    pub start: H256,
    /// Digest after every executed step, in order.
    pub digests: Vec<H256>,
    /// Why the run stopped.
    pub stop: StopReason,
}

impl Trace {
    /// Digest of the last state reached.
    pub fn last(&self) -> H256 {
        self.digests.last().copied().unwrap_or(self.start)
    }
}

/// A MIPS machine stepping over memory kept in a [`PreimageStore`].
#[derive(Clone, Debug)]
pub struct Emulator {
    state: State,
    digest: H256,
}

impl Emulator {
    /// Creates an emulator at `state`, recording its snapshot in `store`.
    pub fn new(state: State, store: &mut PreimageStore) -> StepResult<Self> {
        let digest = state.store(store)?;
        Ok(Self { state, digest })
    }

    /// Creates an emulator at the state with the given digest.
    pub fn from_digest(store: &PreimageStore, digest: H256) -> StepResult<Self> {
        Ok(Self {
            state: State::load(store, digest)?,
            digest,
        })
    }

    /// The current state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Digest of the current state.
    pub fn digest(&self) -> H256 {
        self.digest
    }

    /// Executes one instruction and returns the new state digest.
    ///
    /// Memory writes and the new snapshot are only committed to `store` once
    /// the instruction completed; on failure neither the emulator nor the
    /// store change, so the same call can be retried once a missing
    /// preimage has been supplied. Stepping an exited machine does nothing.
    pub fn step(&mut self, store: &mut PreimageStore) -> StepResult<H256> {
        if self.state.exited {
            return Ok(self.digest);
        }

        let mut next = self.state.clone();
        let mut mem = Memory::new(store, next.memory_root);
        execute(&mut next, &mut mem)?;

        let (root, staged) = mem.finish();
        next.memory_root = root;
        next.step += 1;

        store.apply(staged)?;
        self.digest = next.store(store)?;
        self.state = next;

        Ok(self.digest)
    }

    /// Steps up to `n` times, stopping early when the program exits or a
    /// step fails.
    pub fn run(&mut self, store: &mut PreimageStore, n: u64) -> Trace {
        let start = self.digest;
        let mut digests = Vec::new();

        let stop = loop {
            if self.state.exited {
                break StopReason::Exited;
            }
            if digests.len() as u64 == n {
                break StopReason::Completed;
            }

            match self.step(store) {
                Ok(d) => digests.push(d),
                Err(e) => break StopReason::Interrupted(e),
            }
        };
        debug!(
            "Ran {} steps from {:#x} to {:#x} ({:?})",
            digests.len(),
            start,
            self.digest,
            stop
        );

        Trace {
            start,
            digests,
            stop,
        }
    }

    /// Replaces the current state (used to build deliberately faulty traces)
    /// and returns its digest.
    pub fn set_state(&mut self, state: State, store: &mut PreimageStore) -> StepResult<H256> {
        self.digest = state.store(store)?;
        self.state = state;

        Ok(self.digest)
    }
}
