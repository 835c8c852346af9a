// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The type oracle contract.
//!
//! Template files are not valid host source, so the resolver never parses
//! them for types. Instead an external oracle loads packages (with
//! synthesized stand-ins overlaid for template files) and reports the
//! package-level symbols with their types.

mod memory;
mod runtime;
pub mod source;

pub use memory::MemoryOracle;
pub use runtime::{runtime_sources, PackageText};

use std::fmt;
use std::path::{Path, PathBuf};

use stencil_ast::Position;
use thiserror::Error;

use crate::overlay::Overlay;
use crate::types::PackageScope;

/// What to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoadTarget {
    /// The package whose sources live in this directory.
    Directory(PathBuf),
    /// A package by import path.
    Path(String),
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadTarget::Directory(dir) => write!(f, "{}", dir.display()),
            LoadTarget::Path(path) => write!(f, "{}", path),
        }
    }
}

/// A single load request.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub target: &'a LoadTarget,
    /// Virtual files that replace or add to on-disk sources.
    pub overlay: Option<&'a Overlay>,
}

/// A problem the oracle found while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleDiagnostic {
    pub file: Option<PathBuf>,
    pub position: Option<Position>,
    pub message: String,
}

impl OracleDiagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            file: None,
            position: None,
            message: message.into(),
        }
    }

    pub fn at(file: impl Into<PathBuf>, position: Position, message: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            position: Some(position),
            message: message.into(),
        }
    }

    /// `true` if the diagnostic belongs to `file`. A positioned diagnostic
    /// belongs only to the file it is positioned in, whatever other files its
    /// message names; an unpositioned one belongs to every file it names.
    pub fn mentions(&self, file: &Path) -> bool {
        match &self.file {
            Some(own) => own == file,
            None => file
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.message.contains(name)),
        }
    }
}

impl fmt::Display for OracleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, &self.position) {
            (Some(file), Some(pos)) => write!(f, "{}:{}: {}", file.display(), pos, self.message),
            (Some(file), None) => write!(f, "{}: {}", file.display(), self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// A loaded package.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    /// Import path.
    pub path: String,
    /// Declared package name.
    pub name: String,
    pub scope: PackageScope,
    pub diagnostics: Vec<OracleDiagnostic>,
}

/// The oracle could not produce a package at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("no package found for `{0}`")]
    NoPackage(String),

    #[error("loading `{target}` failed: {message}")]
    Failed { target: String, message: String },
}

/// Loads packages with type information.
pub trait TypeOracle {
    fn load(&self, request: LoadRequest<'_>) -> Result<LoadedPackage, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_mentions_file() {
        let stand_in = Path::new("ui/button_templ.go");
        let positioned = OracleDiagnostic::at(stand_in, Position { line: 3, col: 1 }, "undefined: x");
        assert!(positioned.mentions(stand_in));

        let named = OracleDiagnostic::new("ui/button_templ.go:3:1: undefined: x");
        assert!(named.mentions(stand_in));

        let other = OracleDiagnostic::at("ui/types.go", Position { line: 1, col: 1 }, "undefined: y");
        assert!(!other.mentions(stand_in));

        let redeclared = OracleDiagnostic::at(
            "ui/types.go",
            Position { line: 3, col: 6 },
            "Button redeclared in this block\n\tui/button_templ.go:7:6: other declaration of Button",
        );
        assert!(!redeclared.mentions(stand_in));
        assert!(redeclared.mentions(Path::new("ui/types.go")));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = OracleDiagnostic::at("a.go", Position { line: 2, col: 5 }, "boom");
        assert_eq!(d.to_string(), "a.go:2:5: boom");
        assert_eq!(OracleDiagnostic::new("plain").to_string(), "plain");
    }
}
