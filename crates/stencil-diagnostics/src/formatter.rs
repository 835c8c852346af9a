// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Terminal formatter for diagnostics.
//!
//! ```text
//! error[S0201]: cannot find component `ui.Buton`
//!   --> app/page.templ:4:3
//!     |
//!   4 |     @ui.Buton()
//!     |      ^^^^^^^^ `example.com/app/ui` has no exported `Buton`
//!     |
//!     = note: in template `Page`
//!     = help: did you mean `Button`?
//! ```

use std::collections::BTreeMap;

use colored::Colorize;
use stencil_ast::{LineMap, Position};

use crate::{Diagnostic, Help, LabelStyle, Severity};

const TAB_WIDTH: usize = 4;

/// Formats diagnostics against the source of one template file.
pub struct DiagnosticFormatter<'a> {
    source: &'a str,
    file_name: Option<&'a str>,
    line_map: LineMap,
}

struct AnnotatedLine {
    line: u32,
    text: String,
    annotations: Vec<Annotation>,
}

struct Annotation {
    /// 1-based display columns, end exclusive.
    col_start: usize,
    col_end: usize,
    style: LabelStyle,
    message: Option<String>,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            file_name: None,
            line_map: LineMap::new(source),
        }
    }

    /// Name shown after `-->`. Without one the diagnostic's own file is used.
    pub fn with_file_name(mut self, name: &'a str) -> Self {
        self.file_name = Some(name);
        self
    }

    pub fn format(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        self.format_header(&mut out, diagnostic);

        let annotated = self.collect_annotated_lines(diagnostic);
        let Some(first) = diagnostic.labels.first() else {
            self.format_footer(&mut out, diagnostic, 2);
            return out;
        };

        let file = match (self.file_name, &diagnostic.file) {
            (Some(name), _) => name.to_string(),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => "<template>".to_string(),
        };
        let pos = self.position(first.span.start);
        out.push_str(&format!("  {} {}:{}\n", "-->".blue(), file, pos));

        let max_line = annotated.last().map(|a| a.line).unwrap_or(1);
        let gutter = max_line.to_string().len().max(2);

        out.push_str(&format!("{} {}\n", " ".repeat(gutter + 1), "|".blue()));
        let mut prev: Option<u32> = None;
        for line in &annotated {
            if prev.is_some_and(|p| line.line > p + 1) {
                out.push_str(&format!("{} {}\n", " ".repeat(gutter), "...".blue()));
            }
            out.push_str(&format!(
                "{:>width$} {} {}\n",
                line.line.to_string().blue().bold(),
                "|".blue(),
                line.text,
                width = gutter + 1,
            ));
            self.format_annotations(&mut out, line, gutter);
            prev = Some(line.line);
        }

        if !diagnostic.notes.is_empty() || diagnostic.help.is_some() {
            out.push_str(&format!("{} {}\n", " ".repeat(gutter + 1), "|".blue()));
        }
        self.format_footer(&mut out, diagnostic, gutter);
        out
    }

    /// Format a batch, separated by blank lines, with a closing summary.
    pub fn format_all(&self, diagnostics: &[Diagnostic]) -> String {
        let mut out: Vec<String> = diagnostics.iter().map(|d| self.format(d)).collect();
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        if errors > 0 {
            let noun = if errors == 1 { "error" } else { "errors" };
            out.push(format!(
                "{}: could not resolve components due to {} previous {}\n",
                "error".red().bold(),
                errors,
                noun
            ));
        }
        out.join("\n")
    }

    fn format_header(&self, out: &mut String, diagnostic: &Diagnostic) {
        let severity = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Note => "note".blue().bold(),
        };
        match &diagnostic.code {
            Some(code) => out.push_str(&format!(
                "{}[{}]: {}\n",
                severity,
                code.0.as_str().red().bold(),
                diagnostic.message.bold()
            )),
            None => out.push_str(&format!("{}: {}\n", severity, diagnostic.message.bold())),
        }
    }

    fn format_footer(&self, out: &mut String, diagnostic: &Diagnostic, gutter: usize) {
        for note in &diagnostic.notes {
            out.push_str(&format!(
                "{} {} {}: {}\n",
                " ".repeat(gutter + 1),
                "=".cyan(),
                "note".cyan().bold(),
                note
            ));
        }
        if let Some(help) = &diagnostic.help {
            self.format_help(out, help, gutter);
        }
    }

    fn format_help(&self, out: &mut String, help: &Help, gutter: usize) {
        out.push_str(&format!(
            "{} {} {}: {}\n",
            " ".repeat(gutter + 1),
            "=".cyan(),
            "help".cyan().bold(),
            help.message
        ));

        let Some(suggestion) = &help.suggestion else {
            return;
        };
        let pos = self.position(suggestion.span.start);
        let Some(line) = self.line_map.line_text(self.source, pos.line) else {
            return;
        };
        let start = (pos.col as usize - 1).min(line.len());
        let end = (start + suggestion.span.len()).min(line.len());
        let (Some(before), Some(after)) = (line.get(..start), line.get(end..)) else {
            return;
        };

        out.push_str(&format!(
            "{:>width$} {} {}{}{}\n",
            pos.line.to_string().blue().bold(),
            "|".blue(),
            expand_tabs(before),
            suggestion.replacement.green(),
            expand_tabs(after),
            width = gutter + 1,
        ));
        out.push_str(&format!(
            "{} {} {}{}\n",
            " ".repeat(gutter + 1),
            "|".blue(),
            " ".repeat(display_width(before)),
            "~".repeat(suggestion.replacement.chars().count()).green(),
        ));
    }

    fn collect_annotated_lines(&self, diagnostic: &Diagnostic) -> Vec<AnnotatedLine> {
        let mut lines: BTreeMap<u32, AnnotatedLine> = BTreeMap::new();

        for label in &diagnostic.labels {
            let start = self.position(label.span.start);
            let end = self.position(label.span.end);
            let raw = self.line_map.line_text(self.source, start.line).unwrap_or("");

            let col_start = display_col(raw, start.col);
            // Multi-line spans underline to the end of the first line.
            let col_end = if end.line == start.line {
                display_col(raw, end.col)
            } else {
                display_width(raw) + 1
            };

            lines
                .entry(start.line)
                .or_insert_with(|| AnnotatedLine {
                    line: start.line,
                    text: expand_tabs(raw),
                    annotations: Vec::new(),
                })
                .annotations
                .push(Annotation {
                    col_start,
                    col_end: col_end.max(col_start + 1),
                    style: label.style,
                    message: label.message.clone(),
                });
        }

        lines.into_values().collect()
    }

    fn format_annotations(&self, out: &mut String, line: &AnnotatedLine, gutter: usize) {
        let mut sorted: Vec<&Annotation> = line.annotations.iter().collect();
        sorted.sort_by_key(|a| (a.style != LabelStyle::Primary, a.col_start));

        let width = sorted.iter().map(|a| a.col_end).max().unwrap_or(1);
        let mut underline = vec![' '; width];
        let mut messages: Vec<(usize, LabelStyle, &str)> = Vec::new();
        for ann in &sorted {
            let ch = match ann.style {
                LabelStyle::Primary => '^',
                LabelStyle::Secondary => '-',
            };
            for slot in &mut underline[ann.col_start - 1..ann.col_end - 1] {
                if *slot == ' ' {
                    *slot = ch;
                }
            }
            if let Some(msg) = &ann.message {
                messages.push((ann.col_start, ann.style, msg));
            }
        }

        let underline: String = underline.into_iter().collect::<String>().trim_end().to_string();
        let pipe = format!("{} {}", " ".repeat(gutter + 1), "|".blue());

        if let [(_, style, msg)] = messages.as_slice() {
            out.push_str(&format!("{} {} {}\n", pipe, color_underline(&underline), styled(msg, *style)));
            return;
        }
        out.push_str(&format!("{} {}\n", pipe, color_underline(&underline)));
        for (col, style, msg) in messages.iter().rev() {
            out.push_str(&format!(
                "{} {}{} {}\n",
                pipe,
                " ".repeat(col - 1),
                styled("|", *style),
                styled(msg, *style),
            ));
        }
    }

    fn position(&self, offset: usize) -> Position {
        self.line_map.position(offset.min(self.source.len()))
    }
}

fn styled(text: &str, style: LabelStyle) -> String {
    match style {
        LabelStyle::Primary => text.red().bold().to_string(),
        LabelStyle::Secondary => text.blue().to_string(),
    }
}

/// `^` runs in red, `-` runs in blue.
fn color_underline(s: &str) -> String {
    let mut result = String::new();
    let mut run = String::new();
    let mut current = None;
    for ch in s.chars() {
        let kind = matches!(ch, '^' | '-').then_some(ch);
        if kind != current && !run.is_empty() {
            result.push_str(&flush_run(&run, current));
            run.clear();
        }
        run.push(ch);
        current = kind;
    }
    if !run.is_empty() {
        result.push_str(&flush_run(&run, current));
    }
    result
}

fn flush_run(run: &str, kind: Option<char>) -> String {
    match kind {
        Some('^') => run.red().bold().to_string(),
        Some('-') => run.blue().to_string(),
        _ => run.to_string(),
    }
}

// Template bodies are usually tab-indented, so columns are measured after
// tab expansion to keep carets under the right characters.

fn expand_tabs(text: &str) -> String {
    text.replace('\t', &" ".repeat(TAB_WIDTH))
}

fn display_width(text: &str) -> usize {
    text.chars().map(|c| if c == '\t' { TAB_WIDTH } else { 1 }).sum()
}

/// Display column of byte column `col` (1-based) in `line`.
fn display_col(line: &str, col: u32) -> usize {
    let byte = (col as usize - 1).min(line.len());
    let prefix = line.get(..byte).unwrap_or(line);
    display_width(prefix) + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_ast::Span;

    const SOURCE: &str = "package app\n\ntempl Page() {\n\t@ui.Buton()\n}\n";

    fn buton_span() -> Span {
        let start = SOURCE.find("ui.Buton").unwrap();
        Span::new(start, start + 8)
    }

    #[test]
    fn test_format_with_label_and_help() {
        colored::control::set_override(false);
        let diag = Diagnostic::error("cannot find component `ui.Buton`")
            .with_code("S0201")
            .with_primary(buton_span(), "no exported `Buton`")
            .with_note("in template `Page`")
            .with_help("did you mean `Button`?");
        let out = DiagnosticFormatter::new(SOURCE).with_file_name("page.templ").format(&diag);

        let expected = "\
error[S0201]: cannot find component `ui.Buton`
  --> page.templ:4:3
    |
  4 |     @ui.Buton()
    |      ^^^^^^^^ no exported `Buton`
    |
    = note: in template `Page`
    = help: did you mean `Button`?
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_format_suggestion() {
        colored::control::set_override(false);
        let diag = Diagnostic::error("cannot find component `ui.Buton`")
            .with_primary(buton_span(), "here")
            .with_suggestion("did you mean `Button`?", buton_span(), "ui.Button");
        let out = DiagnosticFormatter::new(SOURCE).format(&diag);
        assert!(out.contains("  --> <template>:4:3\n"));
        assert!(out.contains("  4 |     @ui.Button()\n"));
        assert!(out.contains("    |      ~~~~~~~~~\n"));
    }

    #[test]
    fn test_format_without_labels() {
        colored::control::set_override(false);
        let diag = Diagnostic::error("import cycle between template packages")
            .with_code("S0220")
            .with_note("cycle: a -> b -> a");
        let out = DiagnosticFormatter::new("").format(&diag);
        assert_eq!(
            out,
            "error[S0220]: import cycle between template packages\n    = note: cycle: a -> b -> a\n"
        );
    }

    #[test]
    fn test_file_from_diagnostic() {
        colored::control::set_override(false);
        let diag = Diagnostic::error("x")
            .with_file("app/page.templ")
            .with_primary(Span::new(0, 7), "here");
        let out = DiagnosticFormatter::new(SOURCE).format(&diag);
        assert!(out.contains("--> app/page.templ:1:1"));
        assert!(out.contains("  1 | package app\n"));
        assert!(out.contains("    | ^^^^^^^ here\n"));
    }

    #[test]
    fn test_format_all_summary() {
        colored::control::set_override(false);
        let diags = vec![Diagnostic::error("a"), Diagnostic::error("b")];
        let out = DiagnosticFormatter::new("").format_all(&diags);
        assert!(out.ends_with("error: could not resolve components due to 2 previous errors\n"));
    }

    #[test]
    fn test_display_columns_expand_tabs() {
        assert_eq!(display_col("\t@x", 2), 5);
        assert_eq!(expand_tabs("\ta"), "    a");
    }
}
