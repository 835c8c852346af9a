// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error code registry.
//!
//! Maps resolution error codes (S0200, S0210, ...) to titles and categories.

use std::collections::HashMap;

use stencil_resolve::{ContractViolation, ResolveErrorKind};

/// Registry of all known error codes.
pub struct ErrorCodeRegistry {
    codes: HashMap<&'static str, ErrorCodeInfo>,
}

/// Information about a single error code.
pub struct ErrorCodeInfo {
    pub code: &'static str,
    pub title: &'static str,
    pub category: ErrorCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Resolution,
    Contract,
    Package,
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Resolution => write!(f, "Resolution"),
            ErrorCategory::Contract => write!(f, "Contract"),
            ErrorCategory::Package => write!(f, "Package"),
            ErrorCategory::Io => write!(f, "I/O"),
        }
    }
}

macro_rules! register_codes {
    ($($code:literal => ($title:literal, $cat:expr)),* $(,)?) => {{
        let mut map = HashMap::new();
        $(
            map.insert($code, ErrorCodeInfo {
                code: $code,
                title: $title,
                category: $cat,
            });
        )*
        map
    }};
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        use ErrorCategory::*;

        Self {
            codes: register_codes! {
                // Lookup (S020x)
                "S0200" => ("component not found", Resolution),
                "S0201" => ("unknown member", Resolution),

                // Component contract (S021x)
                "S0210" => ("function does not return a component", Contract),
                "S0211" => ("render method has the wrong signature", Contract),
                "S0212" => ("render method needs a pointer receiver", Contract),
                "S0213" => ("type has no render method", Contract),
                "S0214" => ("reference is not callable", Contract),

                // Packages (S022x)
                "S0220" => ("circular dependency between template packages", Package),
                "S0221" => ("package failed to load", Package),

                // Files (S023x)
                "S0230" => ("file or module error", Io),
            },
        }
    }
}

impl ErrorCodeRegistry {
    pub fn get(&self, code: &str) -> Option<&ErrorCodeInfo> {
        self.codes.get(code)
    }

    /// All codes, sorted.
    pub fn all(&self) -> Vec<&ErrorCodeInfo> {
        let mut codes: Vec<_> = self.codes.values().collect();
        codes.sort_by_key(|c| c.code);
        codes
    }
}

/// Code for an error kind.
pub fn code_for(kind: &ResolveErrorKind) -> &'static str {
    match kind {
        ResolveErrorKind::NotFound { reference, .. } if reference.contains('.') => "S0201",
        ResolveErrorKind::NotFound { .. } => "S0200",
        ResolveErrorKind::ContractMismatch { violation, .. } => match violation {
            ContractViolation::ResultCount { .. } | ContractViolation::ResultType { .. } => "S0210",
            ContractViolation::RenderArity { .. }
            | ContractViolation::RenderParamType { .. }
            | ContractViolation::RenderResultCount { .. }
            | ContractViolation::RenderResultType { .. } => "S0211",
            ContractViolation::ReceiverKind { .. } => "S0212",
            ContractViolation::MissingRender { .. } => "S0213",
            ContractViolation::NotCallable { .. } => "S0214",
        },
        ResolveErrorKind::Cycle { .. } => "S0220",
        ResolveErrorKind::Load { .. } => "S0221",
        ResolveErrorKind::Io { .. } => "S0230",
    }
}
