use std::path::PathBuf;

use cannon::config::CliDisputeConfig;
use clap::{Parser, Subcommand, ValueHint};

/// MIPS fault-proof checkpoints and disputes
#[derive(Parser)]
#[command(version, propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,

    /// Directory to read inputs from and write checkpoints to.
    #[arg(long, global = true, env = "BASEDIR", default_value = "/tmp/cannon", value_hint = ValueHint::DirPath)]
    pub(crate) basedir: PathBuf,

    /// Keep the files of this block in `<basedir>/0_<block number>`.
    #[arg(long, global = true, env = "CANNON_BLOCK_NUMBER")]
    pub(crate) block_number: Option<u64>,

    #[clap(flatten)]
    pub(crate) dispute: CliDisputeConfig,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Loads a program and writes the checkpoint of its state before the
    /// first instruction to `golden.json`.
    Golden {
        /// Big endian MIPS program image, mapped at address 0.
        #[arg(short, long, env = "CANNON_PROGRAM", value_hint = ValueHint::FilePath)]
        program: PathBuf,
    },
    /// Executes from a checkpoint and writes the checkpoint it stops at.
    Run {
        /// The checkpoint to start from.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        checkpoint: PathBuf,
        /// Input (e.g. a block header) whose digest is placed at the input
        /// address before running.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,
        /// Number of steps to execute. Runs until the program exits if
        /// omitted.
        #[arg(short, long)]
        target: Option<u64>,
        /// Overwrite `$v0` after this step, producing a wrong trace.
        #[arg(long, env = "REGFAULT")]
        regfault: Option<u64>,
    },
    /// Disputes the execution of a block between two locally simulated
    /// parties and prints the verdict.
    Challenge {
        /// Checkpoint of the golden state.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        golden: PathBuf,
        /// The block header fed to the program.
        #[arg(long, value_hint = ValueHint::FilePath)]
        header: PathBuf,
        /// Number of steps the disputed claims cover.
        #[arg(short, long)]
        steps: u64,
        /// Make the defender's trace wrong after this step.
        #[arg(long)]
        defender_fault: Option<u64>,
        /// Make the challenger's trace wrong after this step.
        #[arg(long)]
        challenger_fault: Option<u64>,
    },
}
