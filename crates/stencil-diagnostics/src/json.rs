// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! JSON diagnostic output for editors and build tooling.
//!
//! One report covers one template file. Every label is enriched with
//! 1-based line/column positions and the source line it points into.

use serde::Serialize;
use stencil_ast::{LineMap, Position, Span};

use crate::codes::ErrorCodeRegistry;
use crate::{Diagnostic, LabelStyle, Severity};

pub const REPORT_VERSION: u32 = 1;

/// All resolution diagnostics for one template file.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub version: u32,
    pub file: String,
    /// No errors were reported.
    pub success: bool,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Registry category, e.g. "Contract".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub labels: Vec<JsonLabel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<JsonSuggestion>,
}

#[derive(Debug, Serialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    pub byte_offset: usize,
    pub source_line: String,
}

#[derive(Debug, Serialize)]
pub struct JsonLabel {
    pub role: LabelStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub start: LineCol,
    pub end: LineCol,
}

#[derive(Debug, Serialize)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
    pub byte_offset: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonSuggestion {
    pub span: Span,
    pub replacement: String,
    /// The source line with the replacement applied.
    pub result_line: String,
}

/// Build a report for the diagnostics of `file`, whose text is `source`.
pub fn to_json_report(diagnostics: &[Diagnostic], source: &str, file: &str) -> DiagnosticReport {
    let registry = ErrorCodeRegistry::default();
    let line_map = LineMap::new(source);
    let ctx = Context {
        source,
        line_map: &line_map,
        registry: &registry,
    };

    let error_count = diagnostics.iter().filter(|d| d.severity == Severity::Error).count();
    let warning_count = diagnostics.iter().filter(|d| d.severity == Severity::Warning).count();

    DiagnosticReport {
        version: REPORT_VERSION,
        file: file.to_string(),
        success: error_count == 0,
        diagnostics: diagnostics.iter().map(|d| ctx.convert(d)).collect(),
        error_count,
        warning_count,
    }
}

pub fn to_json_string(report: &DiagnosticReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

struct Context<'a> {
    source: &'a str,
    line_map: &'a LineMap,
    registry: &'a ErrorCodeRegistry,
}

impl Context<'_> {
    fn convert(&self, diag: &Diagnostic) -> JsonDiagnostic {
        let code = diag.code.as_ref().map(|c| c.0.clone());
        let category = code
            .as_deref()
            .and_then(|c| self.registry.get(c))
            .map(|info| info.category.to_string());

        let location = diag
            .labels
            .iter()
            .find(|l| l.style == LabelStyle::Primary)
            .or(diag.labels.first())
            .map(|l| {
                let pos = self.position(l.span.start);
                SourceLocation {
                    line: pos.line,
                    column: pos.col,
                    byte_offset: l.span.start,
                    source_line: self.line(pos.line).to_string(),
                }
            });

        let labels = diag
            .labels
            .iter()
            .map(|l| JsonLabel {
                role: l.style,
                message: l.message.clone(),
                start: self.line_col(l.span.start),
                end: self.line_col(l.span.end),
            })
            .collect();

        let suggestion = diag
            .help
            .as_ref()
            .and_then(|h| h.suggestion.as_ref())
            .map(|s| JsonSuggestion {
                span: s.span,
                replacement: s.replacement.clone(),
                result_line: self.apply(s.span, &s.replacement),
            });

        JsonDiagnostic {
            severity: diag.severity,
            code,
            category,
            message: diag.message.clone(),
            location,
            labels,
            notes: diag.notes.clone(),
            help: diag.help.as_ref().map(|h| h.message.clone()),
            suggestion,
        }
    }

    fn position(&self, offset: usize) -> Position {
        self.line_map.position(offset.min(self.source.len()))
    }

    fn line_col(&self, offset: usize) -> LineCol {
        let pos = self.position(offset);
        LineCol {
            line: pos.line,
            column: pos.col,
            byte_offset: offset,
        }
    }

    fn line(&self, line: u32) -> &str {
        self.line_map.line_text(self.source, line).unwrap_or("")
    }

    /// The line holding `span` with `replacement` spliced in. Spans that
    /// cross a line end keep the rest of the first line.
    fn apply(&self, span: Span, replacement: &str) -> String {
        let pos = self.position(span.start);
        let text = self.line(pos.line);
        let start = (pos.col as usize).saturating_sub(1).min(text.len());
        let end = (start + span.len()).min(text.len());
        match (text.get(..start), text.get(end..)) {
            (Some(before), Some(after)) => format!("{}{}{}", before, replacement, after),
            _ => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "package app\n\ntempl Page() {\n\t@ui.Buton()\n}\n";

    fn not_found() -> Diagnostic {
        // `ui.Buton` starts after "\t@" on line 4.
        let start = SOURCE.find("ui.Buton").unwrap();
        let span = Span::new(start, start + "ui.Buton".len());
        Diagnostic::error("cannot find component `ui.Buton`")
            .with_code("S0201")
            .with_primary(span, "no exported `Buton`")
            .with_suggestion("did you mean `Button`?", span, "ui.Button")
    }

    #[test]
    fn test_report_counts_and_location() {
        let diags = vec![not_found(), Diagnostic::warning("unused import")];
        let report = to_json_report(&diags, SOURCE, "app/page.templ");
        assert!(!report.success);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.warning_count, 1);

        let first = &report.diagnostics[0];
        assert_eq!(first.category.as_deref(), Some("Resolution"));
        let loc = first.location.as_ref().unwrap();
        assert_eq!((loc.line, loc.column), (4, 3));
        assert_eq!(loc.source_line, "\t@ui.Buton()");
        assert_eq!(first.labels[0].end.column, 11);
        assert_eq!(first.suggestion.as_ref().unwrap().result_line, "\t@ui.Button()");
        assert!(report.diagnostics[1].location.is_none());
    }

    #[test]
    fn test_json_shape() {
        let report = to_json_report(&[not_found()], SOURCE, "page.templ");
        let text = to_json_string(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["diagnostics"][0]["severity"], "error");
        assert_eq!(value["diagnostics"][0]["code"], "S0201");
        assert_eq!(value["diagnostics"][0]["labels"][0]["role"], "primary");
        assert!(value["diagnostics"][0].get("notes").is_none());
    }

    #[test]
    fn test_empty_report_succeeds() {
        let report = to_json_report(&[], "", "empty.templ");
        assert!(report.success);
        assert!(report.diagnostics.is_empty());
    }
}
