use anyhow::Result;
use ::cannon::{env::load_dotenvy_vars_if_present, paths};
use clap::Parser;
use cli::Command;
use dispute::DisputeArgs;

use self::cannon::*;
mod cannon {
    pub mod cli;
    pub mod dispute;
    pub mod execute;
}

fn main() -> Result<()> {
    load_dotenvy_vars_if_present();
    ::cannon::tracing::init();

    let args = cli::Cli::parse();
    let root = paths::root_dir(&args.basedir, args.block_number);
    let config = args.dispute.into();

    match args.command {
        Command::Golden { program } => execute::golden(&program, &root),
        Command::Run {
            checkpoint,
            input,
            target,
            regfault,
        } => execute::run(
            &checkpoint,
            input.as_deref(),
            target,
            regfault,
            &root,
            config,
        ),
        Command::Challenge {
            golden,
            header,
            steps,
            defender_fault,
            challenger_fault,
        } => dispute::challenge(
            DisputeArgs {
                golden: &golden,
                header: &header,
                steps,
                defender_fault,
                challenger_fault,
                block_number: args.block_number.unwrap_or_default(),
            },
            config,
        ),
    }
}
