//! The boundary through which disputes are submitted.

use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use ethereum_types::H256;
use log::{debug, info};
use mipsevm::{loader::seed_input, State};
use preimage_trie::{PreimageStore, SharedPreimages};

use crate::{
    bisection::{BisectionController, Outcome},
    config::DisputeConfig,
    error::{ChallengeError, ChallengeResult},
    fetch::PreimageOracle,
    party::Party,
    session::{ChallengeId, ChallengeSession},
};

/// Registers disputes about the execution of a program from its golden
/// state, and runs them.
///
/// The host starts out knowing only what the shared cache holds. Whenever it
/// needs a preimage it does not have, the failing call returns
/// [`ChallengeError::MissingNode`] and the digest is remembered until it is
/// supplied through [`DisputeHost::supply_preimage`], after which the call
/// can be repeated.
#[derive(Debug)]
pub struct DisputeHost {
    golden: H256,
    store: PreimageStore,
    config: DisputeConfig,
    sessions: BTreeMap<ChallengeId, ChallengeSession>,
    next_id: u64,
    next_missing: Option<H256>,
}

impl DisputeHost {
    /// Creates a host for disputes starting from the golden state with
    /// digest `golden`, reading through to `shared`.
    pub fn new(golden: H256, shared: Arc<SharedPreimages>, config: DisputeConfig) -> Self {
        Self {
            golden,
            store: PreimageStore::with_shared(shared),
            config,
            sessions: BTreeMap::new(),
            next_id: 0,
            next_missing: None,
        }
    }

    /// Digest of the golden state.
    pub fn golden(&self) -> H256 {
        self.golden
    }

    /// The host's private store.
    pub fn store(&self) -> &PreimageStore {
        &self.store
    }

    fn remember_missing<T>(&mut self, res: ChallengeResult<T>) -> ChallengeResult<T> {
        if let Err(ChallengeError::MissingNode(digest)) = &res {
            debug!("Host needs preimage {:#x}", digest);
            self.next_missing = Some(*digest);
        }
        res
    }

    fn start_state(&mut self, next_header: &[u8]) -> ChallengeResult<H256> {
        let golden = State::load(&self.store, self.golden)?;
        let start = seed_input(&mut self.store, &golden, next_header)?;
        Ok(start.digest())
    }

    /// Registers a dispute over the first `step_budget` steps of the block
    /// `block_number`, whose header the program reads as its input. The
    /// defender claims the trace reaches `assertion`, the challenger
    /// `counter`.
    pub fn initiate_challenge(
        &mut self,
        block_number: u64,
        next_header: &[u8],
        assertion: H256,
        counter: H256,
        step_budget: u64,
    ) -> ChallengeResult<ChallengeId> {
        if step_budget == 0 {
            return Err(ChallengeError::InvalidStepBudget);
        }

        let res = self.start_state(next_header);
        let start = self.remember_missing(res)?;
        self.next_missing = None;

        let id = ChallengeId(self.next_id);
        let session =
            ChallengeSession::new(id, block_number, start, assertion, counter, step_budget)?;
        self.next_id += 1;
        self.sessions.insert(id, session);

        info!(
            "Initiated challenge {} for block {} from {:#x} ({} steps)",
            id, block_number, start, step_budget
        );
        Ok(id)
    }

    /// Supplies a preimage the host asked for.
    pub fn supply_preimage(&mut self, digest: H256, bytes: impl Into<Bytes>) -> ChallengeResult<()> {
        self.store.put(digest, bytes)?;
        if self.next_missing == Some(digest) {
            self.next_missing = None;
        }
        Ok(())
    }

    /// The digest the last failed call was missing, until it is supplied.
    pub fn next_missing_digest(&self) -> Option<H256> {
        self.next_missing
    }

    /// The session registered under `id`.
    pub fn session(&self, id: ChallengeId) -> Option<&ChallengeSession> {
        self.sessions.get(&id)
    }

    /// Every registered session, by id.
    pub fn sessions(&self) -> impl Iterator<Item = &ChallengeSession> {
        self.sessions.values()
    }

    /// Runs the session `id` to its end.
    ///
    /// The controller works on a fork of the host store and fetches anything
    /// else from `oracle` first and from the parties second. What it learns
    /// is not kept by the host. A preimage none of them has is remembered as
    /// the next missing digest, and the call can be repeated once it is
    /// supplied.
    pub fn run_dispute(
        &mut self,
        id: ChallengeId,
        defender: &mut dyn Party,
        challenger: &mut dyn Party,
        oracle: &dyn PreimageOracle,
    ) -> ChallengeResult<Outcome> {
        let mut controller =
            BisectionController::new(self.store.clone(), self.config).with_oracle(oracle);
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(ChallengeError::UnknownChallenge(id))?;

        let res = controller.run(session, defender, challenger);
        self.remember_missing(res)
    }
}
