mod clean;
mod core;
mod feedback;
mod process;
mod toolchain;

pub use clean::{clean, remove_intermediates};
pub use core::{BuildReport, DEBUG_SOURCE, HEADER_NAME, MAIN_SOURCE, ModuleBuilder};
pub use feedback::FeedbackAnalyzer;
pub use process::{ProcessRunner, ToolCommand, ToolOutput, ToolRunner, run_checked, split_flags};
pub use toolchain::{COMPILE_FLAGS, LINK_FLAGS, Toolchain};

use crate::codegen::TemplateRepository;
use crate::config::ProjectConfig;
use crate::log::BuildLog;
use crate::model::ProjectModel;
use crate::store::ArtifactStore;

/// The artifact store of a loaded project file.
pub fn store_for(config: &ProjectConfig) -> ArtifactStore {
    ArtifactStore::new(
        &config.project.build_dir,
        config.project_name(),
        &config.toolchain.extension,
    )
}

/// A builder wired to a loaded project file.
pub fn builder_for<'a>(
    config: &ProjectConfig,
    runner: Box<dyn ToolRunner + 'a>,
    log: &'a dyn BuildLog,
) -> ModuleBuilder<'a> {
    let store = store_for(config);
    let templates = TemplateRepository::new(&config.toolchain.templates, &config.project.target);
    ModuleBuilder::new(
        Toolchain::from_config(&config.toolchain),
        templates,
        store,
        runner,
        log,
    )
}
