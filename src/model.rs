//! Project model: locations, programs and debug variables.
//!
//! The IEC front end produces one C translation unit set per location plus
//! an inventory of program instances and monitorable variables. This module
//! holds those types and the [`ProjectModel`] seam the pipeline reads them
//! through.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// One generated C file with its per-file compile flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub file: PathBuf,
    #[serde(default)]
    pub cflags: String,
}

impl SourceUnit {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            cflags: String::new(),
        }
    }

    pub fn is_c_source(&self) -> bool {
        self.file.extension().is_some_and(|ext| ext == "c")
    }
}

/// A scope of generated code.
///
/// `""` is the main code and `"()"` the plc code; both carry ordinary
/// sources. Extension locations are `callable` and get init/cleanup/
/// retrieve/publish hooks generated for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub callable: bool,
    #[serde(default)]
    pub sources: Vec<SourceUnit>,
}

impl Location {
    pub fn new(key: impl Into<String>, callable: bool, sources: Vec<SourceUnit>) -> Self {
        Self {
            key: key.into(),
            callable,
            sources,
        }
    }

    /// Whether lifecycle calls are generated for this location.
    pub fn has_calls(&self) -> bool {
        self.callable && !self.sources.is_empty()
    }

    /// Whether this location's sources are compiled into the module.
    pub fn is_compiled(&self) -> bool {
        !self.callable && !self.sources.is_empty()
    }

    /// Human label used in build logs.
    pub fn display_name(&self) -> &str {
        match self.key.as_str() {
            "" => "main code",
            "()" => "plc code",
            other => other,
        }
    }
}

/// Variable category as emitted by the IEC front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
pub enum VarCategory {
    EXT,
    IN,
    MEM,
    OUT,
    VAR,
    FB,
}

/// One monitorable variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugVariable {
    pub path: String,
    pub category: VarCategory,
    #[serde(rename = "type")]
    pub iec_type: String,
    #[serde(default)]
    pub retain: bool,
}

impl DebugVariable {
    pub fn new(
        path: impl Into<String>,
        category: VarCategory,
        iec_type: impl Into<String>,
        retain: bool,
    ) -> Self {
        Self {
            path: path.into(),
            category,
            iec_type: iec_type.into(),
            retain,
        }
    }

    /// Top-level variables have no member access in their C path.
    pub fn is_top_level(&self) -> bool {
        !self.path.contains('.')
    }
}

/// A top-level program instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub path: String,
}

impl ProgramEntry {
    pub fn new(type_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            path: path.into(),
        }
    }
}

/// Programs and variables extracted from the IEC front end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub programs: Vec<ProgramEntry>,
    #[serde(default)]
    pub variables: Vec<DebugVariable>,
}

impl Inventory {
    /// Load an inventory JSON document.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BuildError::Extraction(format!("cannot read inventory {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            BuildError::Extraction(format!("malformed inventory {}: {}", path.display(), e))
        })
    }
}

/// What the build pipeline needs from a project.
pub trait ProjectModel {
    fn project_name(&self) -> &str;

    /// Locations in init order.
    fn locations(&self) -> &[Location];

    /// Programs and debug variables; fails when extraction did not succeed.
    fn inventory(&self) -> Result<Inventory>;

    fn extensions_disabled(&self) -> bool;
}
