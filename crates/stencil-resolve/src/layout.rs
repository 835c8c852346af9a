// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Mapping between directories and package paths.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::ResolveError;
use crate::host::lexer::unquote;

pub const MODULE_FILE: &str = "go.mod";

/// A module rooted at a directory. A directory `<root>/a/b` holds the
/// package `<module path>/a/b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    root: PathBuf,
    module_path: String,
}

impl ModuleLayout {
    pub fn new(root: impl Into<PathBuf>, module_path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            module_path: module_path.into(),
        }
    }

    /// Find the module containing `start` by walking up to the nearest
    /// module file.
    pub fn discover(start: &Path) -> Result<Self, ResolveError> {
        for dir in start.ancestors() {
            let candidate = dir.join(MODULE_FILE);
            if !candidate.is_file() {
                continue;
            }
            let text = fs::read_to_string(&candidate).map_err(|e| ResolveError::io(&candidate, &e))?;
            let module_path = parse_module_line(&text).ok_or_else(|| {
                ResolveError::invalid_module(&candidate, "missing `module` directive")
            })?;
            debug!(root = %dir.display(), module = %module_path, "module discovered");
            return Ok(Self::new(dir, module_path));
        }
        Err(ResolveError::invalid_module(
            start,
            format!("no {} found in this directory or any parent", MODULE_FILE),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    /// Package path of the package in `dir`, or `None` outside the module.
    pub fn package_path(&self, dir: &Path) -> Option<String> {
        let rel = normalize(dir).strip_prefix(normalize(&self.root)).ok()?.to_path_buf();
        let segments: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        if segments.is_empty() {
            Some(self.module_path.clone())
        } else {
            Some(format!("{}/{}", self.module_path, segments.join("/")))
        }
    }

    /// Directory of package `path`, or `None` if it is not in the module.
    pub fn dir_for(&self, path: &str) -> Option<PathBuf> {
        if path == self.module_path {
            return Some(self.root.clone());
        }
        let rest = path.strip_prefix(&self.module_path)?.strip_prefix('/')?;
        Some(rest.split('/').fold(self.root.clone(), |dir, seg| dir.join(seg)))
    }
}

/// Drop `.` components so `./ui` and `ui` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn parse_module_line(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or("").trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim();
        let path = if rest.starts_with('"') || rest.starts_with('`') {
            unquote(rest)?
        } else {
            rest.to_string()
        };
        (!path.is_empty()).then_some(path)
    })
}
