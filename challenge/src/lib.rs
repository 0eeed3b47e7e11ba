//! Interactive disputes over MIPS execution traces.
//!
//! Two parties that disagree about the state a program reaches after some
//! number of steps are asked for their intermediate state digests until the
//! disagreement is narrowed down to a single instruction, which is then
//! executed by a neutral [`mipsevm::Emulator`]. Whichever claim matches the
//! result wins.
//!
//! The pieces are:
//! - [`ChallengeSession`]: the bisection bookkeeping of one dispute.
//! - [`BisectionController`]: plays the rounds against two [`Party`]s and
//!   executes the disputed step.
//! - [`Fetcher`]/[`PreimageOracle`]: resume emulator operations that ran into
//!   a missing preimage.
//! - [`DisputeHost`]: registers disputes from a golden state.
//! - [`Checkpoint`]: the JSON file format states travel in.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod bisection;
pub mod checkpoint;
pub mod config;
mod error;
pub mod fetch;
pub mod host;
pub mod party;
pub mod session;

pub use bisection::{BisectionController, Outcome};
pub use checkpoint::{Checkpoint, CheckpointError};
pub use config::DisputeConfig;
pub use error::{ChallengeError, ChallengeResult};
pub use fetch::{Fetcher, NoOracle, OracleChain, PreimageOracle};
pub use host::DisputeHost;
pub use party::{Party, Peer, Role, TraceParty};
pub use session::{ChallengeId, ChallengeSession, Round, SessionStatus, Verdict};
