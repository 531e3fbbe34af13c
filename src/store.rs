//! Build artifact and toolchain state.
//!
//! Layout of a build directory:
//! ```text
//! <build_dir>/
//! ├── plc_main.c, plc_debugger.c, beremiz.h   # rendered each build
//! ├── <name>.bin                              # binary module (persistent)
//! └── lastbuildPLC.md5                        # hex MD5 of <name>.bin
//! ```
//! Objects and the ELF image only exist while a build runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

pub const HASH_FILE_NAME: &str = "lastbuildPLC.md5";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    build_dir: PathBuf,
    project_name: String,
    extension: String,
    cached_hash: Option<String>,
    /// Last compiled MD5 per source. Informational only.
    source_digests: BTreeMap<PathBuf, String>,
}

impl ArtifactStore {
    pub fn new(
        build_dir: impl Into<PathBuf>,
        project_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            build_dir: build_dir.into(),
            project_name: project_name.into(),
            extension: extension.into(),
            cached_hash: None,
            source_digests: BTreeMap::new(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Point the store at another build directory. A new directory starts
    /// from a clean state.
    pub fn set_build_dir(&mut self, build_dir: impl Into<PathBuf>) {
        let build_dir = build_dir.into();
        if self.build_dir != build_dir {
            self.build_dir = build_dir;
            self.cached_hash = None;
            self.source_digests.clear();
        }
    }

    pub fn binary_name(&self) -> String {
        format!("{}{}", self.project_name, self.extension)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.build_dir.join(self.binary_name())
    }

    pub fn elf_name(&self) -> String {
        format!("{}.elf", self.project_name)
    }

    pub fn elf_path(&self) -> PathBuf {
        self.build_dir.join(self.elf_name())
    }

    /// Where the packager writes before the module replaces the binary.
    pub fn staged_binary_path(&self) -> PathBuf {
        self.build_dir.join(format!("{}.tmp", self.binary_name()))
    }

    pub fn hash_file_path(&self) -> PathBuf {
        self.build_dir.join(HASH_FILE_NAME)
    }

    /// Hash of the current binary: cached value, else the side-car file,
    /// else `None` (unknown).
    pub fn binary_hash(&self) -> Option<String> {
        if let Some(hash) = &self.cached_hash {
            return Some(hash.clone());
        }
        fs::read_to_string(self.hash_file_path())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Forget the binary identity until the next successful build.
    pub fn reset_binary_hash(&mut self) {
        self.cached_hash = None;
        let _ = fs::remove_file(self.hash_file_path());
    }

    /// Cache and persist the hash of a freshly installed binary.
    pub fn record_hash(&mut self, hash: &str) -> Result<()> {
        let path = self.hash_file_path();
        fs::write(&path, hash).map_err(|e| BuildError::fs(&path, e))?;
        self.cached_hash = Some(hash.to_string());
        Ok(())
    }

    pub fn source_digest(&self, source: &Path) -> Option<&str> {
        self.source_digests.get(source).map(String::as_str)
    }

    pub fn record_source_digests(&mut self, digests: impl IntoIterator<Item = (PathBuf, String)>) {
        self.source_digests.extend(digests);
    }

    pub fn source_digest_count(&self) -> usize {
        self.source_digests.len()
    }
}
