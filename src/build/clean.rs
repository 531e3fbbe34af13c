//! Build artifact cleanup.
//!
//! - intermediate objects and ELF images are dropped after every build
//! - `plcmod clean` removes the whole build directory

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const INTERMEDIATE_EXTENSIONS: [&str; 2] = ["o", "elf"];

/// Remove `*.o` and `*.elf` directly inside `build_dir`.
///
/// Best effort: a file that cannot be removed is left behind silently.
/// Returns how many files were removed.
pub fn remove_intermediates(build_dir: &Path) -> usize {
    let mut removed = 0;
    for entry in WalkDir::new(build_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|ext| INTERMEDIATE_EXTENSIONS.iter().any(|i| ext == *i))
            && fs::remove_file(path).is_ok()
        {
            removed += 1;
        }
    }
    removed
}

pub fn clean(build_dir: &Path) -> Result<()> {
    if build_dir.exists() {
        fs::remove_dir_all(build_dir)
            .with_context(|| format!("Failed to remove {}", build_dir.display()))?;
        println!("{} Removed {}", "✓".green(), build_dir.display());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(())
}
