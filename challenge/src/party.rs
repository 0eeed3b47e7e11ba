//! The two sides of a dispute.

use std::{collections::BTreeMap, fmt};

use bytes::Bytes;
use ethereum_types::H256;
use log::{debug, info};
use mipsevm::{Emulator, StepError};
use preimage_trie::PreimageStore;

use crate::{
    config::DisputeConfig,
    error::ChallengeResult,
    fetch::PreimageOracle,
};

/// Which claim a party backs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Role {
    /// Backs the asserted final state.
    Defender,
    /// Backs the counter claim.
    Challenger,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Defender => write!(f, "defender"),
            Role::Challenger => write!(f, "challenger"),
        }
    }
}

/// A participant in a dispute.
pub trait Party {
    /// The claim this party backs.
    fn role(&self) -> Role;

    /// The digest this party claims the trace reaches after `step` steps.
    fn claim_at(&mut self, step: u64) -> ChallengeResult<H256>;

    /// Serves a preimage the party knows to the other side.
    fn preimage(&self, digest: H256) -> Option<Bytes>;
}

/// Lets a [`Party`] act as a peer [`PreimageOracle`].
#[derive(Clone, Copy)]
pub struct Peer<'a>(pub &'a dyn Party);

impl fmt::Debug for Peer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Peer").field(&self.0.role()).finish()
    }
}

impl PreimageOracle for Peer<'_> {
    fn fetch(&self, digest: H256) -> Option<Bytes> {
        self.0.preimage(digest)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct RegisterFault {
    step: u64,
    reg: usize,
    value: u32,
}

/// A party that backs the trace it computes itself.
///
/// The party owns a private store that must already hold the start state and
/// everything the program touches. Digests are produced by running the
/// emulator from the closest cached snapshot; a snapshot is kept every
/// `snapshot_interval` steps and at every step that was asked for.
#[derive(Debug)]
pub struct TraceParty {
    role: Role,
    store: PreimageStore,
    start: H256,
    snapshots: BTreeMap<u64, H256>,
    snapshot_interval: u64,
    fault: Option<RegisterFault>,
    /// Step at which the trace stopped changing (exit or halt).
    frozen_at: Option<u64>,
}

impl TraceParty {
    /// Creates a party starting from the state with digest `start`.
    pub fn new(role: Role, store: PreimageStore, start: H256, config: &DisputeConfig) -> Self {
        Self {
            role,
            store,
            start,
            snapshots: BTreeMap::from([(0, start)]),
            snapshot_interval: config.snapshot_interval.max(1),
            fault: None,
            frozen_at: None,
        }
    }

    /// Makes the party overwrite register `reg` with `value` right after
    /// executing the instruction at index `step`, so its trace is first wrong
    /// at `step + 1`.
    pub fn with_register_fault(mut self, step: u64, reg: usize, value: u32) -> Self {
        self.fault = Some(RegisterFault { step, reg, value });
        self
    }

    /// The party's private store.
    pub fn store(&self) -> &PreimageStore {
        &self.store
    }

    /// The digest after `step` steps, if it has been computed already.
    pub fn cached(&self, step: u64) -> Option<H256> {
        self.snapshots.get(&step).copied()
    }

    fn run_to(&mut self, target: u64) -> ChallengeResult<H256> {
        let (mut cur, digest) = self
            .snapshots
            .range(..=target)
            .next_back()
            .map(|(s, d)| (*s, *d))
            .unwrap_or((0, self.start));
        let mut emu = Emulator::from_digest(&self.store, digest)?;

        while cur < target {
            match emu.step(&mut self.store) {
                Ok(_) => {}
                Err(e @ StepError::HaltedFault { .. }) => {
                    info!("{} trace halted after {} steps: {}", self.role, cur, e);
                    self.frozen_at = Some(cur);
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            if let Some(fault) = self.fault.filter(|f| f.step == cur) {
                let mut state = emu.state().clone();
                if let Some(r) = state.registers.get_mut(fault.reg) {
                    *r = fault.value;
                }
                emu.set_state(state, &mut self.store)?;
                debug!(
                    "{} corrupted register {} after step {}",
                    self.role, fault.reg, cur
                );
            }
            cur += 1;

            if emu.state().exited {
                self.frozen_at = Some(cur);
                self.snapshots.insert(cur, emu.digest());
                break;
            }
            if cur % self.snapshot_interval == 0 {
                self.snapshots.insert(cur, emu.digest());
            }
        }

        self.snapshots.insert(cur, emu.digest());
        Ok(emu.digest())
    }
}

impl Party for TraceParty {
    fn role(&self) -> Role {
        self.role
    }

    fn claim_at(&mut self, step: u64) -> ChallengeResult<H256> {
        if let Some(d) = self.cached(step) {
            return Ok(d);
        }

        let step = match self.frozen_at {
            Some(frozen) => step.min(frozen),
            None => step,
        };
        if let Some(d) = self.cached(step) {
            return Ok(d);
        }

        self.run_to(step)
    }

    fn preimage(&self, digest: H256) -> Option<Bytes> {
        self.store.get(&digest).ok()
    }
}

#[cfg(test)]
mod tests {
    use mipsevm::{
        asm::{assemble, ops::*, T0, V0, ZERO},
        loader::load_program,
        Emulator,
    };
    use preimage_trie::PreimageStore;

    use super::{Party, Role, TraceParty};
    use crate::config::DisputeConfig;

    /// Increments `$t0` forever.
    fn spin() -> (PreimageStore, Emulator) {
        let mut store = PreimageStore::new();
        let golden = load_program(
            &mut store,
            &assemble([addiu(T0, T0, 1), j(0), nop()]),
        )
        .unwrap();
        let emu = Emulator::new(golden, &mut store).unwrap();
        (store, emu)
    }

    fn config(snapshot_interval: u64) -> DisputeConfig {
        DisputeConfig {
            snapshot_interval,
            ..Default::default()
        }
    }

    #[test]
    fn claims_follow_the_emulator() {
        let (store, emu) = spin();
        let mut reference = emu.clone();
        let mut ref_store = store.clone();
        let trace = reference.run(&mut ref_store, 40);

        let mut party = TraceParty::new(Role::Defender, store, emu.digest(), &config(8));

        // Out of order on purpose, so later claims start from snapshots.
        for step in [40, 3, 17, 16, 1, 0] {
            let expected = match step {
                0 => trace.start,
                s => trace.digests[s as usize - 1],
            };
            assert_eq!(party.claim_at(step).unwrap(), expected);
        }
        assert_eq!(party.cached(8), Some(trace.digests[7]));
        assert_eq!(party.cached(17), Some(trace.digests[16]));
    }

    #[test]
    fn register_faults_diverge_after_the_faulty_step() {
        let (store, emu) = spin();
        let start = emu.digest();
        let mut honest = TraceParty::new(Role::Defender, store.clone(), start, &config(4));
        let mut faulty = TraceParty::new(Role::Challenger, store, start, &config(4))
            .with_register_fault(5, T0 as usize, 0xbaba_baba);

        for step in 0..=5 {
            assert_eq!(honest.claim_at(step).unwrap(), faulty.claim_at(step).unwrap());
        }
        for step in 6..12 {
            assert_ne!(honest.claim_at(step).unwrap(), faulty.claim_at(step).unwrap());
        }
    }

    #[test]
    fn exited_traces_freeze() {
        let mut store = PreimageStore::new();
        let golden = load_program(
            &mut store,
            &assemble([addiu(V0, ZERO, 4246), syscall()]),
        )
        .unwrap();
        let start = golden.digest();
        let mut party = TraceParty::new(Role::Defender, store, start, &config(16));

        let exited = party.claim_at(2).unwrap();

        assert_ne!(exited, start);
        assert_eq!(party.claim_at(100).unwrap(), exited);
        assert_eq!(party.claim_at(3).unwrap(), exited);
    }

    #[test]
    fn halted_traces_freeze_at_the_last_good_state() {
        let mut store = PreimageStore::new();
        let golden = load_program(&mut store, &assemble([addiu(T0, ZERO, 1), divu(T0, ZERO)]))
            .unwrap();
        let start = golden.digest();
        let mut party = TraceParty::new(Role::Challenger, store, start, &config(16));

        let one = party.claim_at(1).unwrap();

        assert_eq!(party.claim_at(50).unwrap(), one);
        assert_eq!(party.claim_at(2).unwrap(), one);
        assert!(party.preimage(one).is_some());
    }
}
