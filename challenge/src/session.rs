//! The state machine of a single dispute.
//!
//! A session starts from a start digest both parties agree on (step `0`) and
//! two different claims about the digest after `step_budget` steps. Each
//! round asks both parties for their digest at the middle of the disputed
//! range and keeps the half in which they first disagree, until the range is
//! a single step. That step is then executed once by a neutral emulator and
//! the result decides the dispute.

use std::fmt;

use ethereum_types::H256;
use log::{debug, info};

use crate::error::{ChallengeError, ChallengeResult};

/// Identifies a session registered with a [`DisputeHost`][crate::DisputeHost].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChallengeId(pub u64);

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a resolved dispute ended.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verdict {
    /// The defender's claim matches the executed step.
    DefenderWins,
    /// The challenger's claim matches the executed step.
    ChallengerWins,
    /// Neither claim matches the executed step.
    BothRefuted,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::DefenderWins => "defender wins",
            Verdict::ChallengerWins => "challenger wins",
            Verdict::BothRefuted => "both claims refuted",
        };

        write!(f, "{}", s)
    }
}

/// Where a session is in its life cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionStatus {
    /// Registered, no rounds played.
    Initiated,
    /// Narrowing down the disputed range.
    Bisecting,
    /// The parties agree on the state after `step` steps but not on the one
    /// after `step + 1`.
    StepDisputed {
        /// Index of the disputed instruction.
        step: u64,
    },
    /// The disputed step was executed.
    Resolved(Verdict),
    /// The parties turned out to agree on the final state.
    NoDivergence,
}

impl SessionStatus {
    /// Returns `true` once nothing more can happen to the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::NoDivergence)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiated => write!(f, "initiated"),
            Self::Bisecting => write!(f, "bisecting"),
            Self::StepDisputed { step } => write!(f, "disputing step {}", step),
            Self::Resolved(v) => write!(f, "resolved ({})", v),
            Self::NoDivergence => write!(f, "without divergence"),
        }
    }
}

/// The claims of both parties at one bisection midpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Round {
    /// The queried step.
    pub step: u64,
    /// The defender's digest at `step`.
    pub defender: H256,
    /// The challenger's digest at `step`.
    pub challenger: H256,
}

impl Round {
    /// Returns `true` if both parties claimed the same digest.
    pub fn agrees(&self) -> bool {
        self.defender == self.challenger
    }
}

/// The bookkeeping of one dispute.
#[derive(Clone, Debug)]
pub struct ChallengeSession {
    id: ChallengeId,
    block_number: u64,
    start_digest: H256,
    assertion_digest: H256,
    counter_digest: H256,
    step_budget: u64,
    max_rounds: usize,

    lower: u64,
    upper: u64,
    /// The digest both parties claim at `lower`.
    agreed: H256,
    /// The defender's and the challenger's digest at `upper`.
    upper_claims: (H256, H256),

    rounds: Vec<Round>,
    status: SessionStatus,
}

/// `ceil(log2(step_budget)) + 1`.
fn max_rounds(step_budget: u64) -> usize {
    let ceil_log2 = match step_budget {
        0 | 1 => 0,
        n => u64::BITS - (n - 1).leading_zeros(),
    };
    ceil_log2 as usize + 1
}

impl ChallengeSession {
    /// Creates a session over `step_budget` steps from `start_digest`, where
    /// the defender asserts `assertion_digest` and the challenger
    /// `counter_digest` as the final state.
    pub fn new(
        id: ChallengeId,
        block_number: u64,
        start_digest: H256,
        assertion_digest: H256,
        counter_digest: H256,
        step_budget: u64,
    ) -> ChallengeResult<Self> {
        if step_budget == 0 {
            return Err(ChallengeError::InvalidStepBudget);
        }

        Ok(Self {
            id,
            block_number,
            start_digest,
            assertion_digest,
            counter_digest,
            step_budget,
            max_rounds: max_rounds(step_budget),
            lower: 0,
            upper: step_budget,
            agreed: start_digest,
            upper_claims: (assertion_digest, counter_digest),
            rounds: Vec::new(),
            status: SessionStatus::Initiated,
        })
    }

    /// The session id.
    pub fn id(&self) -> ChallengeId {
        self.id
    }

    /// The block whose execution is disputed.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Digest of the agreed start state.
    pub fn start_digest(&self) -> H256 {
        self.start_digest
    }

    /// The defender's final digest.
    pub fn assertion_digest(&self) -> H256 {
        self.assertion_digest
    }

    /// The challenger's final digest.
    pub fn counter_digest(&self) -> H256 {
        self.counter_digest
    }

    /// The number of steps the claims cover.
    pub fn step_budget(&self) -> u64 {
        self.step_budget
    }

    /// The most rounds this session may take.
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// The current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The rounds played so far.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// The disputed range `(lower, upper)`. The parties agree at `lower`.
    pub fn bounds(&self) -> (u64, u64) {
        (self.lower, self.upper)
    }

    /// The digest both parties claim at the lower bound.
    pub fn agreed_digest(&self) -> H256 {
        self.agreed
    }

    /// The defender's and the challenger's digest at the upper bound.
    pub fn disputed_claims(&self) -> (H256, H256) {
        self.upper_claims
    }

    fn transition_error(&self, op: &'static str) -> ChallengeError {
        ChallengeError::InvalidTransition {
            op,
            status: self.status.to_string(),
        }
    }

    fn settle_if_collapsed(&mut self) {
        if self.upper - self.lower > 1 {
            self.status = SessionStatus::Bisecting;
            return;
        }

        let (defender, challenger) = self.upper_claims;
        self.status = match defender == challenger {
            true => SessionStatus::NoDivergence,
            false => SessionStatus::StepDisputed { step: self.lower },
        };
        debug!("Challenge {} is now {}", self.id, self.status);
    }

    /// Starts bisecting.
    pub fn begin(&mut self) -> ChallengeResult<SessionStatus> {
        if self.status != SessionStatus::Initiated {
            return Err(self.transition_error("begin"));
        }

        self.settle_if_collapsed();
        Ok(self.status)
    }

    /// The step both parties must claim a digest for next.
    pub fn midpoint(&self) -> ChallengeResult<u64> {
        match self.status {
            SessionStatus::Bisecting => Ok(self.lower + (self.upper - self.lower) / 2),
            _ => Err(self.transition_error("pick a midpoint")),
        }
    }

    /// Records both parties' digests at the current midpoint and narrows the
    /// range to the half where they first disagree.
    pub fn record_round(&mut self, defender: H256, challenger: H256) -> ChallengeResult<SessionStatus> {
        let step = self.midpoint().map_err(|_| self.transition_error("record a round"))?;
        if self.rounds.len() == self.max_rounds {
            return Err(ChallengeError::RoundLimitExceeded(self.max_rounds));
        }

        let round = Round {
            step,
            defender,
            challenger,
        };
        self.rounds.push(round);

        match round.agrees() {
            true => {
                self.lower = step;
                self.agreed = defender;
            }
            false => {
                self.upper = step;
                self.upper_claims = (defender, challenger);
            }
        }
        debug!(
            "Challenge {} round {}: {} at step {}, range is now [{}, {}]",
            self.id,
            self.rounds.len(),
            if round.agrees() { "agreed" } else { "disagreed" },
            step,
            self.lower,
            self.upper
        );

        self.settle_if_collapsed();
        Ok(self.status)
    }

    /// Decides the dispute given the digest obtained by executing the
    /// disputed step from the agreed state.
    pub fn resolve(&mut self, post_digest: H256) -> ChallengeResult<Verdict> {
        if !matches!(self.status, SessionStatus::StepDisputed { .. }) {
            return Err(self.transition_error("resolve"));
        }

        let (defender, challenger) = self.upper_claims;
        let verdict = if post_digest == defender {
            Verdict::DefenderWins
        } else if post_digest == challenger {
            Verdict::ChallengerWins
        } else {
            Verdict::BothRefuted
        };
        info!(
            "Challenge {} resolved at step {}: {} (post state: {:#x})",
            self.id, self.lower, verdict, post_digest
        );

        self.status = SessionStatus::Resolved(verdict);
        Ok(verdict)
    }
}
