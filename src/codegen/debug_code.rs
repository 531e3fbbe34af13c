//! `plc_debugger.c` generation: extern declarations and the debug
//! descriptor table.
//!
//! Descriptor index is the only handle the runtime debugger uses, so the
//! array keeps the input order of the inventory with function block
//! instances left out.

use std::collections::HashMap;

use super::template::Template;
use crate::error::Result;
use crate::model::{DebugVariable, Inventory, VarCategory};

/// Type tag suffix of a descriptor entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorTag {
    /// Located or external variable referenced through a pointer.
    Pointer,
    /// Memory or output variable owning its value behind a pointer.
    Owned,
    Plain,
}

impl DescriptorTag {
    /// `None` for function block instances, which never get a descriptor.
    pub fn for_category(category: VarCategory) -> Option<Self> {
        match category {
            VarCategory::EXT | VarCategory::IN => Some(DescriptorTag::Pointer),
            VarCategory::MEM | VarCategory::OUT => Some(DescriptorTag::Owned),
            VarCategory::VAR => Some(DescriptorTag::Plain),
            VarCategory::FB => None,
        }
    }

    pub fn enum_name(&self, iec_type: &str) -> String {
        match self {
            DescriptorTag::Pointer => format!("{iec_type}_P_ENUM"),
            DescriptorTag::Owned => format!("{iec_type}_O_ENUM"),
            DescriptorTag::Plain => format!("{iec_type}_ENUM"),
        }
    }
}

/// One entry of `dbgvardsc[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor<'a> {
    pub index: usize,
    pub variable: &'a DebugVariable,
    pub tag: DescriptorTag,
}

impl Descriptor<'_> {
    pub fn literal(&self) -> String {
        format!(
            "{{&({}), {}}}",
            self.variable.path,
            self.tag.enum_name(&self.variable.iec_type)
        )
    }
}

/// Descriptor table in index order.
pub fn descriptors(variables: &[DebugVariable]) -> Vec<Descriptor<'_>> {
    variables
        .iter()
        .filter_map(|v| DescriptorTag::for_category(v.category).map(|tag| (v, tag)))
        .enumerate()
        .map(|(index, (variable, tag))| Descriptor {
            index,
            variable,
            tag,
        })
        .collect()
}

/// Indices of descriptors whose variable is retained.
pub fn retained_indices(descriptors: &[Descriptor<'_>]) -> Vec<usize> {
    descriptors
        .iter()
        .filter(|d| d.variable.retain)
        .map(|d| d.index)
        .collect()
}

fn extern_declaration(v: &DebugVariable) -> String {
    let (t, p) = (&v.iec_type, &v.path);
    match v.category {
        VarCategory::EXT | VarCategory::IN | VarCategory::MEM | VarCategory::OUT => {
            format!("extern __IEC_{t}_p {p};")
        }
        VarCategory::VAR => format!("extern __IEC_{t}_t {p};"),
        VarCategory::FB => format!("extern       {t}   {p};"),
    }
}

/// The six fragments substituted into the debug template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugFragments {
    pub programs_declarations: String,
    pub extern_variables_declarations: String,
    pub variable_decl_array: String,
    pub retain_vardsc_index_array: String,
    pub var_access_code: String,
    pub dbg_ptr_cnt: String,
}

impl DebugFragments {
    pub fn new(inventory: &Inventory, var_access_code: impl Into<String>) -> Self {
        let table = descriptors(&inventory.variables);

        let programs_declarations = inventory
            .programs
            .iter()
            .map(|p| format!("extern {} {};", p.type_name, p.path))
            .collect::<Vec<_>>()
            .join("\n");

        let extern_variables_declarations = inventory
            .variables
            .iter()
            .filter(|v| v.is_top_level())
            .map(extern_declaration)
            .collect::<Vec<_>>()
            .join("\n");

        let variable_decl_array = table
            .iter()
            .map(Descriptor::literal)
            .collect::<Vec<_>>()
            .join(",\n");

        let retain_vardsc_index_array = table
            .iter()
            .filter(|d| d.variable.retain)
            .map(|d| format!("/* {} */ {}", d.variable.path, d.index))
            .collect::<Vec<_>>()
            .join(",\n");

        let dbg_ptr_cnt = (0..table.len())
            .map(|i| format!("\tptr[{i}] = dbgvardsc[{i}].ptr;"))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            programs_declarations,
            extern_variables_declarations,
            variable_decl_array,
            retain_vardsc_index_array,
            var_access_code: var_access_code.into(),
            dbg_ptr_cnt,
        }
    }

    pub fn values(&self) -> HashMap<&'static str, String> {
        HashMap::from([
            ("programs_declarations", self.programs_declarations.clone()),
            (
                "extern_variables_declarations",
                self.extern_variables_declarations.clone(),
            ),
            ("variable_decl_array", self.variable_decl_array.clone()),
            (
                "retain_vardsc_index_array",
                self.retain_vardsc_index_array.clone(),
            ),
            ("var_access_code", self.var_access_code.clone()),
            ("dbg_ptr_cnt", self.dbg_ptr_cnt.clone()),
        ])
    }
}

pub fn render_debug(template: &Template, fragments: &DebugFragments) -> Result<String> {
    template.render(&fragments.values())
}
