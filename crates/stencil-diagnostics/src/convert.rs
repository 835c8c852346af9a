// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Conversions from resolution errors to diagnostics.

use stencil_resolve::{CallResolution, ContractViolation, ResolveError, ResolveErrorKind};

use crate::codes::code_for;
use crate::suggestions::closest;
use crate::{Diagnostic, ToDiagnostic};

impl ToDiagnostic for ResolveError {
    fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(headline(&self.kind)).with_code(code_for(&self.kind));
        if let Some(file) = &self.file {
            diag = diag.with_file(file.clone());
        }
        let label = self.span.map(|span| (span, label_text(&self.kind)));
        if let Some((span, text)) = &label {
            diag = diag.with_primary(*span, text.clone());
        }

        match &self.kind {
            ResolveErrorKind::NotFound {
                reference,
                candidates,
                ..
            } => {
                let (prefix, name) = match reference.rsplit_once('.') {
                    Some((prefix, name)) => (Some(prefix), name),
                    None => (None, reference.as_str()),
                };
                let Some(best) = closest(name, candidates.iter().map(String::as_str)) else {
                    return diag;
                };
                let fixed = match prefix {
                    Some(prefix) => format!("{}.{}", prefix, best),
                    None => best.to_string(),
                };
                let message = format!("did you mean `{}`?", best);
                match self.span {
                    // Only offer a rewrite when the span covers exactly the
                    // reference text.
                    Some(span) if span.len() == reference.len() => {
                        diag.with_suggestion(message, span, fixed)
                    }
                    _ => diag.with_help(message),
                }
            }
            ResolveErrorKind::ContractMismatch { violation, .. } => {
                let diag = match label {
                    Some(_) => diag,
                    None => diag.with_note(violation.to_string()),
                };
                match contract_help(violation) {
                    Some(help) => diag.with_help(help),
                    None => diag,
                }
            }
            ResolveErrorKind::Cycle { path } => diag
                .with_note(format!("cycle: {}", path.join(" -> ")))
                .with_help("move the shared components into a package that neither side imports"),
            ResolveErrorKind::Load { diagnostics, .. } => diagnostics
                .iter()
                .fold(diag, |d, msg| d.with_note(msg.clone())),
            ResolveErrorKind::Io { path, message } => {
                diag.with_note(format!("{}: {}", path.display(), message))
            }
        }
    }
}

fn headline(kind: &ResolveErrorKind) -> String {
    match kind {
        ResolveErrorKind::NotFound { reference, .. } => {
            format!("cannot find component `{}`", reference)
        }
        ResolveErrorKind::ContractMismatch { reference, .. } => {
            format!("`{}` cannot be used as a component", reference)
        }
        ResolveErrorKind::Cycle { .. } => "import cycle between template packages".to_string(),
        ResolveErrorKind::Load { package, .. } => format!("failed to load package `{}`", package),
        ResolveErrorKind::Io { .. } => "cannot read template sources".to_string(),
    }
}

fn label_text(kind: &ResolveErrorKind) -> String {
    match kind {
        ResolveErrorKind::NotFound { detail, .. } => detail.clone(),
        ResolveErrorKind::ContractMismatch { violation, .. } => violation.to_string(),
        ResolveErrorKind::Load { .. } => "needed to resolve this call".to_string(),
        _ => "referenced here".to_string(),
    }
}

fn contract_help(violation: &ContractViolation) -> Option<String> {
    match violation {
        ContractViolation::ResultCount { .. } => {
            Some("a component function returns exactly one value".to_string())
        }
        ContractViolation::ResultType { expected, .. } => {
            Some(format!("change the result type to `{}`", expected))
        }
        ContractViolation::RenderArity { method, .. }
        | ContractViolation::RenderParamType { method, .. }
        | ContractViolation::RenderResultCount { method, .. }
        | ContractViolation::RenderResultType { method, .. } => Some(format!(
            "declare it as `{}(ctx context.Context, w io.Writer) error`",
            method
        )),
        ContractViolation::ReceiverKind { method, type_name } => Some(format!(
            "pass a `*{}`, or declare `{}` on a value receiver",
            type_name, method
        )),
        ContractViolation::MissingRender { method, type_name } => Some(format!(
            "add `func (x {}) {}(ctx context.Context, w io.Writer) error`",
            type_name, method
        )),
        ContractViolation::NotCallable { .. } => None,
    }
}

/// Diagnostics for every failed call in a resolved document, in call order.
pub fn resolution_diagnostics(resolutions: &[CallResolution]) -> Vec<Diagnostic> {
    resolutions
        .iter()
        .filter_map(|res| {
            let err = res.result.as_ref().err()?;
            let mut diag = err.to_diagnostic();
            if diag.labels.is_empty() {
                diag = diag.with_primary(res.span, label_text(&err.kind));
            }
            Some(diag.with_note(format!("in template `{}`", res.template)))
        })
        .collect()
}
