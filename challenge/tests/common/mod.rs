//! Helpers shared by the dispute integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use challenge::{Checkpoint, ChallengeResult, DisputeConfig, Party, Role, TraceParty};
use dispute_common::keccak;
use ethereum_types::H256;
use mipsevm::{
    asm::{assemble, li, ops::*, Reg, A0, S0, T0, T1, V0, ZERO},
    isa::{ORACLE_DATA_ADDR, ORACLE_KEY_ADDR},
    loader::{load_program, seed_input, INPUT_ADDR},
};
use preimage_trie::{PreimageStore, SharedPreimages};

pub const S1: Reg = 17;
pub const S2: Reg = 18;
pub const S3: Reg = 19;
/// Never touched by [`dispute_program`], so a corrupted value sticks.
pub const S7: Reg = 23;

pub const BUDGET: u64 = 100;
pub const FAULT_VALUE: u32 = 0xbaba_baba;

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

/// Copies the input digest to the oracle key, reads the input through the
/// oracle and stores a running sum of its words at `0x0010_0000`. With a 64
/// byte input it exits after 199 steps.
pub fn dispute_program() -> Vec<u32> {
    li(S0, INPUT_ADDR)
        .into_iter()
        .chain(li(S1, ORACLE_KEY_ADDR))
        .chain([
            addiu(T0, ZERO, 8),
            lw(T1, 0, S0),
            sw(T1, 0, S1),
            addiu(S0, S0, 4),
            addiu(S1, S1, 4),
            addiu(T0, T0, -1),
            bgtz(T0, -6),
            nop(),
            addiu(V0, ZERO, 4020),
            syscall(),
        ])
        .chain(li(S2, ORACLE_DATA_ADDR))
        .chain(li(S3, 0x0010_0000))
        .chain([
            lw(T0, 0, S2),
            addiu(S2, S2, 4),
            lw(T1, 0, S2),
            addu(A0, A0, T1),
            sw(A0, 0, S3),
            addiu(S2, S2, 4),
            addiu(S3, S3, 4),
            addiu(T0, T0, -4),
            bgtz(T0, -7),
            nop(),
            addiu(V0, ZERO, 4246),
            syscall(),
        ])
        .collect()
}

pub fn header(block_number: u64) -> Vec<u8> {
    (0..64).map(|i| (block_number as u8).wrapping_mul(31) ^ i).collect()
}

/// Everything a dispute about one block needs.
pub struct Fixture {
    /// The golden state with its memory.
    pub golden: Checkpoint,
    pub block_number: u64,
    pub header: Vec<u8>,
    /// Digest of the golden state with the header seeded.
    pub start: H256,
    /// Knows the seeded start state and its memory.
    pub full_store: PreimageStore,
}

pub fn fixture(block_number: u64) -> Fixture {
    init_logger();
    let mut store = PreimageStore::new();
    let golden_state = load_program(&mut store, &assemble(dispute_program())).unwrap();
    let golden = Checkpoint::capture(&store, golden_state.digest()).unwrap();

    let header = header(block_number);
    let start = seed_input(&mut store, &golden_state, &header).unwrap();

    Fixture {
        golden,
        block_number,
        header,
        start: start.digest(),
        full_store: store,
    }
}

impl Fixture {
    /// A golden checkpoint loaded into a fresh shared cache.
    pub fn shared(&self) -> Arc<SharedPreimages> {
        let shared = Arc::new(SharedPreimages::new());
        self.golden.fill_shared(&shared).unwrap();
        shared
    }

    pub fn honest(&self, role: Role) -> TraceParty {
        TraceParty::new(
            role,
            self.full_store.clone(),
            self.start,
            &DisputeConfig {
                snapshot_interval: 16,
                ..Default::default()
            },
        )
    }

    /// A party whose trace is first wrong after instruction `step`.
    pub fn faulty(&self, role: Role, step: u64) -> TraceParty {
        self.honest(role)
            .with_register_fault(step, S7 as usize, FAULT_VALUE)
    }
}

/// Final claims of both parties over [`BUDGET`] steps.
pub fn final_claims(
    defender: &mut dyn Party,
    challenger: &mut dyn Party,
) -> (H256, H256) {
    (
        defender.claim_at(BUDGET).unwrap(),
        challenger.claim_at(BUDGET).unwrap(),
    )
}

/// Claims honestly up to `honest_until` and makes things up afterwards.
pub struct Forger {
    pub inner: TraceParty,
    pub honest_until: u64,
    pub salt: &'static str,
}

impl Party for Forger {
    fn role(&self) -> Role {
        self.inner.role()
    }

    fn claim_at(&mut self, step: u64) -> ChallengeResult<H256> {
        match step <= self.honest_until {
            true => self.inner.claim_at(step),
            false => Ok(keccak(format!("{}/{}", self.salt, step))),
        }
    }

    fn preimage(&self, digest: H256) -> Option<bytes::Bytes> {
        self.inner.preimage(digest)
    }
}

/// Claims like the wrapped party but never shares a preimage.
pub struct Withholding(pub TraceParty);

impl Party for Withholding {
    fn role(&self) -> Role {
        self.0.role()
    }

    fn claim_at(&mut self, step: u64) -> ChallengeResult<H256> {
        self.0.claim_at(step)
    }

    fn preimage(&self, _digest: H256) -> Option<bytes::Bytes> {
        None
    }
}
