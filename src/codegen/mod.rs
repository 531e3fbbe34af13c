mod debug_code;
mod main_code;
mod sequence;
mod template;

pub use debug_code::{
    DebugFragments, Descriptor, DescriptorTag, descriptors, render_debug, retained_indices,
};
pub use main_code::{MainFragments, render_main};
pub use sequence::{CallPlan, StagedCall};
pub use template::{Template, TemplateRepository};

use crate::error::Result;
use crate::model::ProjectModel;

/// Rendered C sources for one build.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub main: String,
    pub debug: String,
}

/// Render `plc_main.c` and `plc_debugger.c` for a project.
///
/// The inventory is extracted before any template is read, so an
/// extraction failure never leaves a partial descriptor table behind.
pub fn generate(project: &dyn ProjectModel, templates: &TemplateRepository) -> Result<GeneratedCode> {
    let inventory = project.inventory()?;

    let main_fragments = MainFragments::new(project.locations(), project.extensions_disabled())?;
    let main = render_main(&templates.main_template()?, &main_fragments)?;

    let debug_template = templates.debug_template()?;
    let debug_fragments = DebugFragments::new(&inventory, templates.var_access_code()?);
    let debug = render_debug(&debug_template, &debug_fragments)?;

    Ok(GeneratedCode { main, debug })
}
