//! `plc_main.c` generation.

use std::collections::HashMap;

use super::sequence::CallPlan;
use super::template::Template;
use crate::error::{BuildError, Result};
use crate::model::Location;

/// The five fragments substituted into the main template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainFragments {
    pub calls_prototypes: String,
    pub retrieve_calls: String,
    pub publish_calls: String,
    pub init_calls: String,
    pub cleanup_calls: String,
}

const CALL_SEPARATOR: &str = "\n    ";

impl MainFragments {
    /// Build the fragments for every location with lifecycle calls.
    ///
    /// With extensions disabled every fragment is empty and the template
    /// renders to a main that only runs the PLC program. Keys of callable
    /// locations become part of C identifiers and must be `[A-Za-z0-9_]+`.
    pub fn new(locations: &[Location], extensions_disabled: bool) -> Result<Self> {
        if extensions_disabled {
            return Ok(Self::default());
        }
        let callable: Vec<&str> = locations
            .iter()
            .filter(|l| l.has_calls())
            .map(|l| l.key.as_str())
            .collect();
        if let Some(key) = callable.iter().find(|k| !is_identifier_fragment(k)) {
            return Err(BuildError::Extraction(format!(
                "location key '{key}' cannot be used in C function names"
            )));
        }
        Ok(Self::from_plan(&CallPlan::new(callable)))
    }

    pub fn from_plan(plan: &CallPlan<'_>) -> Self {
        let calls_prototypes = plan
            .forward()
            .map(|s| {
                format!(
                    "int __init_{s}(int argc,char **argv);\n\
                     void __cleanup_{s}(void);\n\
                     void __retrieve_{s}(void);\n\
                     void __publish_{s}(void);"
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let retrieve_calls = plan
            .forward()
            .map(|s| format!("__retrieve_{s}();"))
            .collect::<Vec<_>>()
            .join(CALL_SEPARATOR);

        let publish_calls = plan
            .reverse()
            .map(|s| format!("__publish_{s}();"))
            .collect::<Vec<_>>()
            .join(CALL_SEPARATOR);

        let init_calls = plan
            .init_calls()
            .iter()
            .map(|c| {
                format!(
                    "init_level={}; if((res = __init_{}(argc,argv))) {{ return res; }}",
                    c.level, c.location
                )
            })
            .collect::<Vec<_>>()
            .join(CALL_SEPARATOR);

        let cleanup_calls = plan
            .cleanup_calls()
            .iter()
            .map(|c| format!("if(init_level >= {}) __cleanup_{}();", c.level, c.location))
            .collect::<Vec<_>>()
            .join(CALL_SEPARATOR);

        Self {
            calls_prototypes,
            retrieve_calls,
            publish_calls,
            init_calls,
            cleanup_calls,
        }
    }

    pub fn values(&self) -> HashMap<&'static str, String> {
        HashMap::from([
            ("calls_prototypes", self.calls_prototypes.clone()),
            ("retrieve_calls", self.retrieve_calls.clone()),
            ("publish_calls", self.publish_calls.clone()),
            ("init_calls", self.init_calls.clone()),
            ("cleanup_calls", self.cleanup_calls.clone()),
        ])
    }
}

fn is_identifier_fragment(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn render_main(template: &Template, fragments: &MainFragments) -> Result<String> {
    template.render(&fragments.values())
}
