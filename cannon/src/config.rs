use challenge::DisputeConfig;
use clap::Args;

const HELP_HEADING: &str = "Dispute options";

/// Dispute tunables, settable from flags or the environment.
#[derive(Args, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CliDisputeConfig {
    /// The most preimages a single emulator step may fetch before the
    /// dispute is abandoned.
    #[arg(long, env = "CANNON_MAX_FETCHES", help_heading = HELP_HEADING, default_value_t = challenge::config::DEFAULT_MAX_FETCHES)]
    max_fetches: usize,
    /// How many steps apart parties keep snapshots of their traces.
    #[arg(long, env = "CANNON_SNAPSHOT_INTERVAL", help_heading = HELP_HEADING, default_value_t = challenge::config::DEFAULT_SNAPSHOT_INTERVAL)]
    snapshot_interval: u64,
}

impl From<CliDisputeConfig> for DisputeConfig {
    fn from(cli: CliDisputeConfig) -> Self {
        Self {
            max_fetches: cli.max_fetches,
            snapshot_interval: cli.snapshot_interval,
        }
    }
}
