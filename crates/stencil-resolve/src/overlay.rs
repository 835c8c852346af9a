// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Virtual source files handed to the type oracle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ResolverConfig;

/// Virtual path → synthesized content, one entry per template file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    files: BTreeMap<PathBuf, String>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Returns `true` if the content changed.
    pub(crate) fn insert(&mut self, path: PathBuf, content: String) -> bool {
        match self.files.get(&path) {
            Some(existing) if *existing == content => false,
            _ => {
                self.files.insert(path, content);
                true
            }
        }
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().map(|(p, c)| (p.as_path(), c.as_str()))
    }

    /// Entries whose file lives directly in `dir`.
    pub fn in_dir<'a>(&'a self, dir: &'a Path) -> impl Iterator<Item = (&'a Path, &'a str)> + 'a {
        self.iter().filter(move |(p, _)| parent_dir(p) == dir)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Directory of a file path; a bare file name lives in `.`.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// The stand-in path for a template file: `foo.templ` → `foo_templ.go`.
/// Returns `None` if the path does not have the template extension.
pub fn overlay_path(template: &Path, config: &ResolverConfig) -> Option<PathBuf> {
    let ext = template.extension()?.to_str()?;
    if ext != config.template_extension {
        return None;
    }
    let stem = template.file_stem()?.to_str()?;
    Some(template.with_file_name(format!("{}{}", stem, config.overlay_suffix)))
}

/// `true` if `path` names a stand-in file.
pub fn is_overlay_path(path: &Path, config: &ResolverConfig) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(&config.overlay_suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_path() {
        let config = ResolverConfig::default();
        assert_eq!(
            overlay_path(Path::new("ui/button.templ"), &config),
            Some(PathBuf::from("ui/button_templ.go"))
        );
        assert_eq!(
            overlay_path(Path::new("page.templ"), &config),
            Some(PathBuf::from("page_templ.go"))
        );
        assert_eq!(overlay_path(Path::new("ui/button.go"), &config), None);
        assert!(is_overlay_path(Path::new("ui/button_templ.go"), &config));
        assert!(!is_overlay_path(Path::new("ui/button.go"), &config));
    }

    #[test]
    fn test_insert_reports_changes() {
        let mut overlay = Overlay::new();
        assert!(overlay.insert("a/x_templ.go".into(), "package a".into()));
        assert!(!overlay.insert("a/x_templ.go".into(), "package a".into()));
        assert!(overlay.insert("a/x_templ.go".into(), "package a\n".into()));
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn test_in_dir() {
        let mut overlay = Overlay::new();
        overlay.insert("a/x_templ.go".into(), String::new());
        overlay.insert("a/b/y_templ.go".into(), String::new());
        overlay.insert("z_templ.go".into(), String::new());
        let a: Vec<_> = overlay.in_dir(Path::new("a")).map(|(p, _)| p.to_path_buf()).collect();
        assert_eq!(a, vec![PathBuf::from("a/x_templ.go")]);
        assert_eq!(overlay.in_dir(Path::new(".")).count(), 1);
    }
}
