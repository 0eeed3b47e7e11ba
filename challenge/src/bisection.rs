//! Drives a [`ChallengeSession`] to its end.

use ethereum_types::H256;
use log::{debug, info};
use mipsevm::{Emulator, StepError};
use preimage_trie::PreimageStore;

use crate::{
    config::DisputeConfig,
    error::{ChallengeError, ChallengeResult},
    fetch::{Fetcher, NoOracle, OracleChain, PreimageOracle},
    party::{Party, Peer, Role},
    session::{ChallengeSession, SessionStatus, Verdict},
};

/// How a dispute ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The disputed step was executed and decided the dispute.
    Resolved {
        /// Index of the disputed instruction.
        step: u64,
        /// The digest the neutral emulator reached after executing it.
        authoritative: H256,
        /// Who was right.
        verdict: Verdict,
    },
    /// Both parties claim the same final state.
    NoDivergence,
}

/// The neutral referee of a dispute.
///
/// The controller only trusts its own emulator. It asks the parties for
/// claims, narrows the dispute down to one step and executes that step
/// itself, pulling any preimage it lacks from a local oracle first and from
/// the parties second.
#[derive(Debug)]
pub struct BisectionController<'o> {
    store: PreimageStore,
    config: DisputeConfig,
    local: &'o dyn PreimageOracle,
}

impl<'o> BisectionController<'o> {
    /// Creates a controller executing over `store`.
    pub fn new(store: PreimageStore, config: DisputeConfig) -> Self {
        Self {
            store,
            config,
            local: &NoOracle,
        }
    }

    /// Sets the oracle asked before the parties (e.g. a checkpoint).
    pub fn with_oracle(mut self, oracle: &'o dyn PreimageOracle) -> Self {
        self.local = oracle;
        self
    }

    /// The controller's store, including everything fetched so far.
    pub fn store(&self) -> &PreimageStore {
        &self.store
    }

    /// Consumes the controller, returning its store.
    pub fn into_store(self) -> PreimageStore {
        self.store
    }

    fn check_roles(defender: &dyn Party, challenger: &dyn Party) -> ChallengeResult<()> {
        for (party, expected) in [(defender, Role::Defender), (challenger, Role::Challenger)] {
            if party.role() != expected {
                return Err(ChallengeError::RoleMismatch {
                    expected,
                    actual: party.role(),
                });
            }
        }
        Ok(())
    }

    /// Plays bisection rounds until the session leaves
    /// [`SessionStatus::Bisecting`].
    pub fn bisect(
        &mut self,
        session: &mut ChallengeSession,
        defender: &mut dyn Party,
        challenger: &mut dyn Party,
    ) -> ChallengeResult<SessionStatus> {
        Self::check_roles(defender, challenger)?;

        let mut status = match session.status() {
            SessionStatus::Initiated => session.begin()?,
            s => s,
        };
        while status == SessionStatus::Bisecting {
            let step = session.midpoint()?;
            let d = defender.claim_at(step)?;
            let c = challenger.claim_at(step)?;
            status = session.record_round(d, c)?;
        }

        debug!(
            "Challenge {} finished bisecting after {} rounds: {}",
            session.id(),
            session.rounds().len(),
            status
        );
        Ok(status)
    }

    /// Executes one step from the state with digest `pre` and returns the
    /// resulting digest.
    ///
    /// If the instruction can not be executed, the machine stays where it is
    /// and `pre` is returned.
    pub fn adjudicate(
        &mut self,
        pre: H256,
        defender: &dyn Party,
        challenger: &dyn Party,
    ) -> ChallengeResult<H256> {
        let chain = OracleChain::new()
            .with(self.local)
            .with(Peer(defender))
            .with(Peer(challenger));
        let fetcher = Fetcher::new(&chain, self.config.max_fetches);

        let mut emu = fetcher.run(&mut self.store, |store| Emulator::from_digest(store, pre))?;
        let post = fetcher.run(&mut self.store, |store| match emu.step(store) {
            Err(StepError::HaltedFault { pc, insn, kind }) => {
                info!(
                    "Disputed step halts at pc {:#010x} (insn: {:#010x}): {}",
                    pc, insn, kind
                );
                Ok(pre)
            }
            res => res,
        })?;

        Ok(post)
    }

    /// Bisects and, if the parties diverge, adjudicates the disputed step
    /// and resolves the session.
    pub fn run(
        &mut self,
        session: &mut ChallengeSession,
        defender: &mut dyn Party,
        challenger: &mut dyn Party,
    ) -> ChallengeResult<Outcome> {
        let step = match self.bisect(session, defender, challenger)? {
            SessionStatus::NoDivergence => {
                info!("Challenge {}: parties agree, nothing to dispute", session.id());
                return Ok(Outcome::NoDivergence);
            }
            SessionStatus::StepDisputed { step } => step,
            s => {
                return Err(ChallengeError::InvalidTransition {
                    op: "adjudicate",
                    status: s.to_string(),
                })
            }
        };

        let authoritative = self.adjudicate(session.agreed_digest(), defender, challenger)?;
        let verdict = session.resolve(authoritative)?;

        Ok(Outcome::Resolved {
            step,
            authoritative,
            verdict,
        })
    }
}
