use ethereum_types::H256;
use mipsevm::StepError;
use preimage_trie::PreimageError;
use thiserror::Error;

use crate::session::ChallengeId;

/// Errors raised while setting up or running a dispute.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ChallengeError {
    /// A preimage is needed that no available source could provide.
    #[error("Missing preimage {0:#x}")]
    MissingNode(H256),

    /// A digest was reported missing again right after its preimage was
    /// supplied.
    #[error("Store did not retain the supplied preimage {0:#x}")]
    StoreInconsistent(H256),

    /// More preimages were needed by a single operation than allowed.
    #[error("Gave up on {digest:#x} after fetching {limit} preimages")]
    FetchLimit {
        /// The digest that was missing when the limit was hit.
        digest: H256,
        /// The configured limit.
        limit: usize,
    },

    /// A supplied preimage was rejected (usually a digest mismatch).
    #[error(transparent)]
    Preimage(#[from] PreimageError),

    /// A dispute must cover at least one step.
    #[error("Step budget must be at least 1")]
    InvalidStepBudget,

    /// The session needed more bisection rounds than its step budget allows.
    #[error("Exceeded the limit of {0} bisection rounds")]
    RoundLimitExceeded(usize),

    /// An operation was attempted in a state that does not permit it.
    #[error("Can not {op} while the session is {status}")]
    InvalidTransition {
        /// The attempted operation.
        op: &'static str,
        /// The session status at the time.
        status: String,
    },

    /// A party was passed in the wrong position.
    #[error("Expected the {expected} but got the {actual}")]
    RoleMismatch {
        /// The role required at that position.
        expected: crate::party::Role,
        /// The role of the party that was passed.
        actual: crate::party::Role,
    },

    /// No session is registered under the id.
    #[error("Unknown challenge {0}")]
    UnknownChallenge(ChallengeId),

    /// The emulator failed with something other than a missing node.
    #[error(transparent)]
    Step(StepError),
}

impl From<StepError> for ChallengeError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::MissingNode(digest) => ChallengeError::MissingNode(digest),
            StepError::Preimage(e) => ChallengeError::Preimage(e),
            e => ChallengeError::Step(e),
        }
    }
}

/// Stores the result of dispute operations.
pub type ChallengeResult<T> = Result<T, ChallengeError>;
