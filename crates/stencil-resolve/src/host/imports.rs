// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Import declarations in preserved template code.
//!
//! Template files keep their host-language imports as opaque declaration
//! text. The resolver reads them for two things: the package dependencies
//! of a template package, and the alias a qualified component reference
//! (`ui.Button`) goes through.

use stencil_ast::{Span, TemplateFile};

use super::lexer::{tokenize_prefix, unquote, Token, TokenKind};

/// One import spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit name: an alias, `_`, or `.`.
    pub name: Option<String>,
    pub path: String,
    /// Span of the explicit name within the declaration text.
    pub name_span: Option<Span>,
    /// Span of the quoted path within the declaration text.
    pub path_span: Span,
}

/// One `import` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub specs: Vec<ImportSpec>,
    /// Offset just past the `(` of a grouped declaration.
    pub group_open: Option<usize>,
    /// Span of the whole declaration within the text.
    pub span: Span,
}

impl ImportSpec {
    /// The name this import is referred to by in code, or `None` for blank
    /// and dot imports.
    pub fn local_name(&self) -> Option<&str> {
        match self.name.as_deref() {
            Some("_") | Some(".") => None,
            Some(alias) => Some(alias),
            None => Some(implicit_name(&self.path)),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name.as_deref() == Some("_")
    }

    pub fn is_dot(&self) -> bool {
        self.name.as_deref() == Some(".")
    }
}

/// Parse the leading import declarations of `text`. Returns an empty list if
/// the text does not start with `import`.
pub fn parse_imports(text: &str) -> Vec<ImportDecl> {
    let tokens = tokenize_prefix(text);
    let mut decls = Vec::new();
    let mut pos = 0;
    while let Some(decl) = parse_one(text, &tokens, &mut pos) {
        decls.push(decl);
        // Optional `;` between declarations on one line.
        if matches!(tokens.get(pos), Some(t) if t.kind == TokenKind::Semi) {
            pos += 1;
        }
    }
    decls
}

fn parse_one(text: &str, tokens: &[Token], pos: &mut usize) -> Option<ImportDecl> {
    let start = *pos;
    let kw = tokens.get(start)?;
    if kw.kind != TokenKind::Ident || kw.text(text) != "import" {
        return None;
    }
    let mut i = start + 1;
    if tokens.get(i)?.kind == TokenKind::LParen {
        let group_open = tokens[i].span.end;
        i += 1;
        let mut specs = Vec::new();
        loop {
            let tok = tokens.get(i)?;
            match tok.kind {
                TokenKind::RParen => {
                    let span = Span::new(kw.span.start, tok.span.end);
                    *pos = i + 1;
                    return Some(ImportDecl {
                        specs,
                        group_open: Some(group_open),
                        span,
                    });
                }
                TokenKind::Semi => i += 1,
                _ => {
                    let spec = parse_spec(text, tokens, &mut i)?;
                    specs.push(spec);
                }
            }
        }
    }
    let spec = parse_spec(text, tokens, &mut i)?;
    let span = Span::new(kw.span.start, spec.path_span.end);
    *pos = i;
    Some(ImportDecl {
        specs: vec![spec],
        group_open: None,
        span,
    })
}

fn parse_spec(text: &str, tokens: &[Token], i: &mut usize) -> Option<ImportSpec> {
    let first = tokens.get(*i)?;
    let (name, name_span) = match first.kind {
        TokenKind::Ident | TokenKind::Dot => {
            *i += 1;
            (Some(first.text(text).to_string()), Some(first.span))
        }
        _ => (None, None),
    };
    let path_tok = tokens.get(*i)?;
    if !matches!(path_tok.kind, TokenKind::String | TokenKind::RawString) {
        return None;
    }
    let path = unquote(path_tok.text(text))?;
    *i += 1;
    Some(ImportSpec {
        name,
        path,
        name_span,
        path_span: path_tok.span,
    })
}

/// All import specs declared by a template file, in source order.
pub fn file_imports(file: &TemplateFile) -> Vec<ImportSpec> {
    file.declarations()
        .flat_map(|d| parse_imports(&d.text))
        .flat_map(|d| d.specs)
        .collect()
}

/// Find the import a qualifier refers to.
pub fn find_alias<'a>(imports: &'a [ImportSpec], qualifier: &str) -> Option<&'a ImportSpec> {
    // Explicit aliases win over names guessed from paths.
    imports
        .iter()
        .find(|spec| spec.name.as_deref() == Some(qualifier))
        .or_else(|| {
            imports
                .iter()
                .find(|spec| spec.name.is_none() && implicit_name(&spec.path) == qualifier)
        })
}

/// The package name an unaliased import is expected to bind.
///
/// The real name is only known after loading the package; this follows the
/// conventions import paths use: the last segment, skipping a `/vN`
/// major-version suffix, without a `.vN` suffix or a `go-` prefix.
pub fn implicit_name(path: &str) -> &str {
    let mut segments = path.rsplit('/');
    let mut last = segments.next().unwrap_or(path);
    if is_major_version(last) {
        if let Some(prev) = segments.next() {
            last = prev;
        }
    }
    if let Some(idx) = last.rfind(".v") {
        if is_major_version(&last[idx + 1..]) {
            last = &last[..idx];
        }
    }
    let last = last.strip_prefix("go-").unwrap_or(last);
    last.strip_suffix("-go").unwrap_or(last)
}

fn is_major_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_ast::{Declaration, Item};

    #[test]
    fn test_single_import() {
        let decls = parse_imports("import \"fmt\"");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].specs[0].path, "fmt");
        assert_eq!(decls[0].specs[0].name, None);
        assert_eq!(decls[0].group_open, None);
    }

    #[test]
    fn test_grouped_imports_with_aliases() {
        let text = "import (\n\t\"fmt\"\n\tw \"example.com/widgets\" // ui kit\n\t_ \"embed\"\n\t. \"strings\"\n)";
        let decls = parse_imports(text);
        let specs = &decls[0].specs;
        assert_eq!(specs.len(), 4);
        assert_eq!(specs[1].name.as_deref(), Some("w"));
        assert_eq!(specs[1].local_name(), Some("w"));
        assert!(specs[2].is_blank());
        assert_eq!(specs[2].local_name(), None);
        assert!(specs[3].is_dot());
        assert_eq!(&text[..decls[0].group_open.unwrap()], "import (");
    }

    #[test]
    fn test_non_import_text() {
        assert!(parse_imports("type Card struct { Name string }").is_empty());
        assert!(parse_imports("var importance = 3").is_empty());
    }

    #[test]
    fn test_unterminated_group_is_ignored() {
        assert!(parse_imports("import (\n\"fmt\"\n").is_empty());
    }

    #[test]
    fn test_implicit_names() {
        assert_eq!(implicit_name("fmt"), "fmt");
        assert_eq!(implicit_name("example.com/widgets"), "widgets");
        assert_eq!(implicit_name("example.com/ui/v2"), "ui");
        assert_eq!(implicit_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(implicit_name("github.com/x/go-chi"), "chi");
        assert_eq!(implicit_name("github.com/x/v"), "v");
    }

    #[test]
    fn test_find_alias_prefers_explicit() {
        let mut file = TemplateFile::new("ui/page.templ");
        file.items.push(Item::Declaration(Declaration {
            text: "import (\n\t\"example.com/a/widgets\"\n\twidgets \"example.com/b/kit\"\n)".into(),
            span: Span::default(),
        }));
        let imports = file_imports(&file);
        assert_eq!(imports.len(), 2);
        let spec = find_alias(&imports, "widgets").unwrap();
        assert_eq!(spec.path, "example.com/b/kit");
        assert!(find_alias(&imports, "kit").is_none());
    }
}
