//! Comparing the output of an exited program with the one on record.

use std::{fs, io, path::Path};

use anyhow::{Context, Result};

/// How a program output relates to the recorded one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputCheck {
    /// The output equals the recorded one.
    Match,
    /// The output differs and replaced the recorded one.
    Mismatch,
    /// Nothing was recorded yet, the output is now.
    Recorded,
}

/// Compares `output` with the contents of `path`, writing `output` there
/// unless they are equal.
pub fn check_output(path: &Path, output: &[u8]) -> Result<OutputCheck> {
    let check = match fs::read(path) {
        Ok(recorded) if recorded == output => return Ok(OutputCheck::Match),
        Ok(_) => OutputCheck::Mismatch,
        Err(e) if e.kind() == io::ErrorKind::NotFound => OutputCheck::Recorded,
        Err(e) => {
            return Err(e).with_context(|| format!("couldn't read output {}", path.display()))
        }
    };

    fs::write(path, output)
        .with_context(|| format!("couldn't write output {}", path.display()))?;
    Ok(check)
}
