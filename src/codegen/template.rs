//! `%(name)s` placeholder rendering and the per-target template repository.
//!
//! Target authors write their C templates with `%(name)s` placeholders and
//! `%%` for a literal percent sign. The placeholder names each template may
//! use are fixed:
//!
//! - main template: `calls_prototypes`, `retrieve_calls`, `publish_calls`,
//!   `init_calls`, `cleanup_calls`
//! - debug template: `programs_declarations`, `extern_variables_declarations`,
//!   `variable_decl_array`, `retain_vardsc_index_array`, `var_access_code`,
//!   `dbg_ptr_cnt`

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{BuildError, Result};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%\((\w+)\)s|%%").expect("valid placeholder regex"))
}

/// A template loaded from disk.
#[derive(Debug, Clone)]
pub struct Template {
    pub path: PathBuf,
    pub content: String,
}

impl Template {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| BuildError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, content))
    }

    /// Substitute every placeholder from `values`.
    ///
    /// Values are inserted verbatim and never rescanned.
    pub fn render(&self, values: &HashMap<&str, String>) -> Result<String> {
        let re = placeholder_re();
        if let Some(missing) = re
            .captures_iter(&self.content)
            .filter_map(|c| c.get(1))
            .find(|key| !values.contains_key(key.as_str()))
        {
            return Err(BuildError::UnknownPlaceholder {
                path: self.path.clone(),
                key: missing.as_str().to_string(),
            });
        }

        let rendered = re.replace_all(&self.content, |caps: &Captures| match caps.get(1) {
            Some(key) => values[key.as_str()].clone(),
            None => "%".to_string(),
        });
        Ok(rendered.into_owned())
    }
}

/// Template files for one target, under `<root>/<target>/`.
#[derive(Debug, Clone)]
pub struct TemplateRepository {
    root: PathBuf,
    target: String,
}

impl TemplateRepository {
    pub fn new(root: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn target_dir(&self) -> PathBuf {
        self.root.join(&self.target)
    }

    pub fn main_template_path(&self) -> PathBuf {
        self.target_dir().join(format!("{}_main.c", self.target))
    }

    pub fn debug_template_path(&self) -> PathBuf {
        self.target_dir().join(format!("{}_debug.c", self.target))
    }

    pub fn var_access_path(&self) -> PathBuf {
        self.target_dir().join("var_access.c")
    }

    pub fn header_path(&self) -> PathBuf {
        self.target_dir().join("beremiz.h")
    }

    pub fn main_template(&self) -> Result<Template> {
        Template::load(&self.main_template_path())
    }

    pub fn debug_template(&self) -> Result<Template> {
        Template::load(&self.debug_template_path())
    }

    /// The static variable-access fragment, copied into the debug code as is.
    pub fn var_access_code(&self) -> Result<String> {
        Ok(Template::load(&self.var_access_path())?.content)
    }
}
