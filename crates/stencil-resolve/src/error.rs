// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Resolution error types.

use std::path::{Path, PathBuf};

use stencil_ast::Span;
use thiserror::Error;

/// A component resolution error.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    /// Location of the offending reference, when there is one.
    pub span: Option<Span>,
    pub file: Option<PathBuf>,
}

impl ResolveError {
    fn new(kind: ResolveErrorKind) -> Self {
        Self {
            kind,
            span: None,
            file: None,
        }
    }

    pub fn cycle(path: Vec<String>) -> Self {
        Self::new(ResolveErrorKind::Cycle { path })
    }

    pub fn load(package: String, diagnostics: Vec<String>) -> Self {
        Self::new(ResolveErrorKind::Load {
            package,
            diagnostics,
        })
    }

    pub fn not_found(reference: String, detail: String, candidates: Vec<String>) -> Self {
        Self::new(ResolveErrorKind::NotFound {
            reference,
            detail,
            candidates,
        })
    }

    pub fn contract(reference: String, violation: ContractViolation) -> Self {
        Self::new(ResolveErrorKind::ContractMismatch {
            reference,
            violation,
        })
    }

    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::new(ResolveErrorKind::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn invalid_module(path: &Path, message: impl Into<String>) -> Self {
        Self::new(ResolveErrorKind::Io {
            path: path.to_path_buf(),
            message: message.into(),
        })
    }

    /// Attach a location, keeping one that is already set.
    pub fn at(mut self, file: &Path, span: Span) -> Self {
        if self.file.is_none() {
            self.file = Some(file.to_path_buf());
            self.span = Some(span);
        }
        self
    }

    pub fn is_load(&self) -> bool {
        matches!(self.kind, ResolveErrorKind::Load { .. })
    }
}

/// The kind of resolution error.
#[derive(Debug, Clone, Error)]
pub enum ResolveErrorKind {
    #[error("import cycle between template packages: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("failed to load package `{package}`: {}", diagnostics.join("; "))]
    Load {
        package: String,
        diagnostics: Vec<String>,
    },

    #[error("component `{reference}` not found: {detail}")]
    NotFound {
        reference: String,
        detail: String,
        /// Names that were in scope, for suggestions.
        candidates: Vec<String>,
    },

    #[error("`{reference}` cannot be used as a component: {violation}")]
    ContractMismatch {
        reference: String,
        violation: ContractViolation,
    },

    #[error("{}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

/// The requirement a declaration failed to meet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("expected a single result, found {found}")]
    ResultCount { found: usize },

    #[error("result type is `{found}`, expected `{expected}`")]
    ResultType { expected: String, found: String },

    #[error("`{method}` takes {found} parameters, expected 2")]
    RenderArity { method: String, found: usize },

    #[error("parameter {index} of `{method}` is `{found}`, expected `{expected}`")]
    RenderParamType {
        method: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("`{method}` returns {found} results, expected 1")]
    RenderResultCount { method: String, found: usize },

    #[error("`{method}` returns `{found}`, expected `error`")]
    RenderResultType { method: String, found: String },

    #[error("`{method}` is declared on `*{type_name}` but the value is not a pointer")]
    ReceiverKind { method: String, type_name: String },

    #[error("`{type_name}` has no `{method}` method")]
    MissingRender { method: String, type_name: String },

    #[error("`{name}` is a {what}, not a function, method or type")]
    NotCallable { name: String, what: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ResolveError::cycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "import cycle between template packages: a -> b -> a");

        let err = ResolveError::load("example.com/ui".into(), vec!["x.go:1:1: boom".into()]);
        assert_eq!(err.to_string(), "failed to load package `example.com/ui`: x.go:1:1: boom");
        assert!(err.is_load());

        let err = ResolveError::contract(
            "Card".into(),
            ContractViolation::RenderArity {
                method: "Render".into(),
                found: 1,
            },
        );
        assert_eq!(
            err.to_string(),
            "`Card` cannot be used as a component: `Render` takes 1 parameters, expected 2"
        );
    }

    #[test]
    fn test_location_is_kept() {
        let err = ResolveError::not_found("X".into(), "no such name".into(), vec![])
            .at(Path::new("a.templ"), Span::new(1, 2))
            .at(Path::new("b.templ"), Span::new(3, 4));
        assert_eq!(err.file.as_deref(), Some(Path::new("a.templ")));
        assert_eq!(err.span, Some(Span::new(1, 2)));
    }
}
