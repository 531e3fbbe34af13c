use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{DebugVariable, Inventory, Location, ProgramEntry, ProjectModel};

pub const DEFAULT_PROJECT_FILE: &str = "plcmod.toml";

#[derive(Deserialize, Debug)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default, rename = "location")]
    pub locations: Vec<Location>,
    #[serde(default, rename = "program")]
    pub programs: Vec<ProgramEntry>,
    #[serde(default, rename = "variable")]
    pub variables: Vec<DebugVariable>,
}

#[derive(Deserialize, Debug)]
pub struct ProjectSection {
    pub name: String,
    pub target: String,
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    #[serde(default)]
    pub disable_extensions: bool,
    pub inventory: Option<PathBuf>,
}

/// Tool locations. Anything left out falls back to the ARM defaults.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ToolchainConfig {
    pub compiler: PathBuf,
    pub linker: PathBuf,
    pub renamer: PathBuf,
    pub packager: PathBuf,
    pub linker_script: PathBuf,
    pub include_dir: PathBuf,
    pub templates: PathBuf,
    pub extension: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("arm-none-eabi-gcc"),
            linker: PathBuf::from("arm-none-eabi-gcc"),
            renamer: PathBuf::from("scripts/rename_obj"),
            packager: PathBuf::from("scripts/mkmodule"),
            linker_script: PathBuf::from("scripts/code_before_data.ld"),
            include_dir: PathBuf::from("scripts/matiec"),
            templates: PathBuf::from("targets"),
            extension: ".bin".to_string(),
        }
    }
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

impl ProjectConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .context("Failed to parse project file - check for syntax errors or unknown categories")
    }

    /// Make every relative path absolute against `base`.
    ///
    /// Bare tool names (no separator) are left alone so they resolve
    /// through PATH.
    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        let join_tool = |p: &Path| {
            if p.components().count() > 1 {
                join(p)
            } else {
                p.to_path_buf()
            }
        };

        self.project.build_dir = join(&self.project.build_dir);
        self.project.inventory = self.project.inventory.as_deref().map(|p| join(p));

        let tc = &mut self.toolchain;
        tc.compiler = join_tool(&tc.compiler);
        tc.linker = join_tool(&tc.linker);
        tc.renamer = join_tool(&tc.renamer);
        tc.packager = join_tool(&tc.packager);
        tc.linker_script = join(&tc.linker_script);
        tc.include_dir = join(&tc.include_dir);
        tc.templates = join(&tc.templates);

        for location in &mut self.locations {
            for unit in &mut location.sources {
                unit.file = join(&unit.file);
            }
        }
    }
}

impl ProjectModel for ProjectConfig {
    fn project_name(&self) -> &str {
        &self.project.name
    }

    fn locations(&self) -> &[Location] {
        &self.locations
    }

    fn inventory(&self) -> crate::error::Result<Inventory> {
        if let Some(path) = &self.project.inventory {
            return Inventory::load(path);
        }
        Ok(Inventory {
            programs: self.programs.clone(),
            variables: self.variables.clone(),
        })
    }

    fn extensions_disabled(&self) -> bool {
        self.project.disable_extensions
    }
}

/// Load the project file and resolve its paths against its directory.
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} not found.\n\n\
            💡 Tip: pass --project <file> or create a {} next to the generated sources.",
            path.display(),
            DEFAULT_PROJECT_FILE
        ));
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    let mut config = ProjectConfig::parse(&content)?;

    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    config.resolve_paths(&base);
    Ok(config)
}
