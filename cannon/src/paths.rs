//! Where checkpoint files live.

use std::path::{Path, PathBuf};

/// The directory holding the files of `block_number`, or `basedir` itself
/// when no block is given.
pub fn root_dir(basedir: &Path, block_number: Option<u64>) -> PathBuf {
    match block_number {
        Some(n) => basedir.join(format!("0_{n}")),
        None => basedir.to_path_buf(),
    }
}

/// The checkpoint of the golden state.
pub fn golden_path(root: &Path) -> PathBuf {
    root.join("golden.json")
}

/// The checkpoint after `step` steps.
pub fn checkpoint_path(root: &Path, step: u64) -> PathBuf {
    root.join(format!("checkpoint_{step}.json"))
}

/// The checkpoint of a program that exited.
pub fn final_checkpoint_path(root: &Path) -> PathBuf {
    root.join("checkpoint_final.json")
}

/// The expected output of the program for this block.
pub fn output_path(root: &Path) -> PathBuf {
    root.join("output")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{checkpoint_path, root_dir};

    #[test]
    fn blocks_get_their_own_directory() {
        let base = Path::new("/tmp/cannon");

        assert_eq!(root_dir(base, None), base);
        assert_eq!(root_dir(base, Some(13284469)), Path::new("/tmp/cannon/0_13284469"));
        assert_eq!(
            checkpoint_path(&root_dir(base, Some(1)), 20),
            Path::new("/tmp/cannon/0_1/checkpoint_20.json")
        );
    }
}
