use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use challenge::{
    ChallengeError, Checkpoint, DisputeConfig, DisputeHost, Outcome, Party, PreimageOracle, Role,
    TraceParty,
};
use mipsevm::isa::reg;
use preimage_trie::SharedPreimages;
use tracing::info;

use super::execute::{seed, REGFAULT_VALUE};

pub(crate) struct DisputeArgs<'a> {
    pub(crate) golden: &'a Path,
    pub(crate) header: &'a Path,
    pub(crate) steps: u64,
    pub(crate) defender_fault: Option<u64>,
    pub(crate) challenger_fault: Option<u64>,
    pub(crate) block_number: u64,
}

fn party(
    role: Role,
    golden: &Checkpoint,
    header: &[u8],
    fault: Option<u64>,
    config: &DisputeConfig,
) -> Result<TraceParty> {
    let mut store = golden.to_store()?;
    let start = seed(&mut store, golden.state, header)?;

    let party = TraceParty::new(role, store, start, config);
    Ok(match fault {
        Some(step) => {
            info!("The {} is faulty after step {}", role, step);
            party.with_register_fault(step, reg::V0, REGFAULT_VALUE)
        }
        None => party,
    })
}

pub(crate) fn challenge(args: DisputeArgs<'_>, config: DisputeConfig) -> Result<()> {
    let golden = Checkpoint::load(args.golden)
        .with_context(|| format!("couldn't load {}", args.golden.display()))?;
    let header = fs::read(args.header)
        .with_context(|| format!("couldn't read header {}", args.header.display()))?;

    let mut defender = party(Role::Defender, &golden, &header, args.defender_fault, &config)?;
    let mut challenger = party(Role::Challenger, &golden, &header, args.challenger_fault, &config)?;
    let assertion = defender.claim_at(args.steps)?;
    let counter = challenger.claim_at(args.steps)?;
    info!("Defender asserts {:#x}, challenger counters {:#x}", assertion, counter);

    // The host starts out empty and is fed golden nodes one request at a time.
    let mut host = DisputeHost::new(golden.state, Arc::new(SharedPreimages::new()), config);
    let id = loop {
        match host.initiate_challenge(args.block_number, &header, assertion, counter, args.steps) {
            Ok(id) => break id,
            Err(ChallengeError::MissingNode(digest)) => {
                let bytes = golden
                    .fetch(digest)
                    .with_context(|| format!("golden checkpoint lacks {digest:#x}"))?;
                info!("Supplying requested node {:#x}", digest);
                host.supply_preimage(digest, bytes)?;
            }
            Err(e) => return Err(e.into()),
        }
    };

    match host.run_dispute(id, &mut defender, &mut challenger, &golden)? {
        Outcome::Resolved {
            step,
            authoritative,
            verdict,
        } => println!("Challenge {id} disputed step {step}: {verdict} (post state {authoritative:#x})"),
        Outcome::NoDivergence => println!("Challenge {id}: both parties agree"),
    }
    Ok(())
}
