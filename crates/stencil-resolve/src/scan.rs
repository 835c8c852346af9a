// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Template file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ResolverConfig;
use crate::error::ResolveError;

/// Directories never searched for templates.
const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules", "testdata"];

/// All template files under `root`, sorted. Hidden and `_`-prefixed
/// directories are skipped along with vendored and test-data trees.
pub fn find_template_files(root: &Path, config: &ResolverConfig) -> Result<Vec<PathBuf>, ResolveError> {
    let mut files = Vec::new();
    visit(root, config, &mut files)?;
    files.sort();
    debug!(root = %root.display(), count = files.len(), "template files found");
    Ok(files)
}

fn visit(dir: &Path, config: &ResolverConfig, files: &mut Vec<PathBuf>) -> Result<(), ResolveError> {
    let entries = fs::read_dir(dir).map_err(|e| ResolveError::io(dir, &e))?;
    let mut subdirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ResolveError::io(dir, &e))?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if path.is_dir() {
            if !name.starts_with('.') && !name.starts_with('_') && !SKIPPED_DIRS.contains(&name) {
                subdirs.push(path);
            }
        } else if path.is_file()
            && path.extension().is_some_and(|ext| ext == config.template_extension.as_str())
        {
            files.push(path);
        }
    }
    subdirs.sort();
    for sub in subdirs {
        visit(&sub, config, files)?;
    }
    Ok(())
}
