use std::{fs, path::Path};

use anyhow::{Context, Result};
use challenge::{Checkpoint, DisputeConfig, Party, Role, TraceParty};
use ethereum_types::H256;
use mipsevm::{
    isa::reg,
    loader::{load_program, read_output, seed_input},
    State,
};
use preimage_trie::PreimageStore;
use tracing::{info, warn};

use cannon::{
    output::{check_output, OutputCheck},
    paths,
};

/// Written into the faulted register, easy to spot in a state dump.
pub(crate) const REGFAULT_VALUE: u32 = 0xbaba_baba;

pub(crate) fn golden(program: &Path, root: &Path) -> Result<()> {
    let image = fs::read(program)
        .with_context(|| format!("couldn't read program {}", program.display()))?;

    let mut store = PreimageStore::new();
    let state = load_program(&mut store, &image)?;
    let checkpoint = Checkpoint::capture(&store, state.digest())?;

    fs::create_dir_all(root)?;
    checkpoint.save(paths::golden_path(root))?;
    info!(
        "Golden state {:#x} with {} preimages",
        checkpoint.state,
        checkpoint.preimages.len()
    );
    Ok(())
}

/// Places `input` into the state with digest `start` and returns the digest
/// of the result.
pub(crate) fn seed(store: &mut PreimageStore, start: H256, input: &[u8]) -> Result<H256> {
    let state = State::load(store, start)?;
    Ok(seed_input(store, &state, input)?.digest())
}

pub(crate) fn run(
    checkpoint: &Path,
    input: Option<&Path>,
    target: Option<u64>,
    regfault: Option<u64>,
    root: &Path,
    config: DisputeConfig,
) -> Result<()> {
    let from = Checkpoint::load(checkpoint)
        .with_context(|| format!("couldn't load {}", checkpoint.display()))?;
    let mut store = from.to_store()?;
    let mut start = from.state;

    let input = input
        .map(|p| fs::read(p).with_context(|| format!("couldn't read input {}", p.display())))
        .transpose()?;
    if let Some(input) = &input {
        start = seed(&mut store, start, input)?;
    }

    let mut party = TraceParty::new(Role::Defender, store, start, &config);
    if let Some(step) = regfault {
        info!("Faulting register {} after step {}", reg::V0, step);
        party = party.with_register_fault(step, reg::V0, REGFAULT_VALUE);
    }

    let digest = party.claim_at(target.unwrap_or(u64::MAX))?;
    let state = State::load(party.store(), digest)?;

    let mut out = Checkpoint::capture(party.store(), digest)?;
    if let Some(input) = input {
        out.add_preimage(input);
    }
    let path = match (target, state.exited) {
        (None, true) => paths::final_checkpoint_path(root),
        _ => paths::checkpoint_path(root, state.step),
    };
    fs::create_dir_all(root)?;
    out.save(&path)?;

    if state.exited {
        info!("Program exited with code {} after {} steps", state.exit_code, state.step);
        match read_output(party.store(), &state)? {
            Some(output) => {
                match check_output(&paths::output_path(root), &output)? {
                    OutputCheck::Match => println!("output match"),
                    OutputCheck::Mismatch => warn!("Output differs from the recorded one, rewrote it"),
                    OutputCheck::Recorded => info!("Recorded output"),
                }
                println!("Output: 0x{}", hex::encode(output));
            }
            None => warn!("Program exited without writing an output"),
        }
    }
    Ok(())
}
