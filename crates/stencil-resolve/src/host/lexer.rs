// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Host-language tokenizer using logos.
//!
//! Only covers what the resolver needs to read: function headers, type
//! expressions, import declarations and `for`/`if` clauses. Whitespace,
//! newlines and comments are skipped.

use logos::Logos;
use stencil_ast::Span;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("*")]
    Star,
    #[token(";")]
    Semi,
    #[token("=")]
    Assign,
    #[token(":=")]
    Define,
    #[token("<-")]
    Arrow,
    #[token("~")]
    Tilde,
    #[token("|")]
    Pipe,

    /// Any other operator character. Never valid in a header.
    #[regex(r"[-+/%&^!<>:?]")]
    Op,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,
    /// Dropped by the tokenizer functions. Kept as a token so an
    /// unterminated comment is a lex error rather than silently skipped.
    #[token("/*", block_comment)]
    BlockComment,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,
    #[regex(r"`[^`]*`")]
    RawString,
    #[regex(r"'([^'\\\n]|\\.)+'")]
    Rune,
    #[regex(r"[0-9][0-9a-zA-Z_.]*")]
    Number,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

/// Consume a block comment up to the first `*/`. Block comments do not nest.
fn block_comment(lexer: &mut logos::Lexer<TokenKind>) -> bool {
    match lexer.remainder().find("*/") {
        Some(end) => {
            lexer.bump(end + 2);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// A character the tokenizer does not recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
}

/// Tokenize `source` completely, failing on the first unknown character.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        match result {
            Ok(TokenKind::BlockComment) => {}
            Ok(kind) => tokens.push(Token {
                kind,
                span: Span::new(range.start, range.end),
            }),
            Err(()) => return Err(LexError { offset: range.start }),
        }
    }
    Ok(tokens)
}

/// Tokenize up to the first unknown character and return what was read.
/// Preserved declarations are arbitrary host code; callers that only need a
/// leading import clause use this instead of failing outright.
pub fn tokenize_prefix(source: &str) -> Vec<Token> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    while let Some(Ok(kind)) = lexer.next() {
        if kind == TokenKind::BlockComment {
            continue;
        }
        let range = lexer.span();
        tokens.push(Token {
            kind,
            span: Span::new(range.start, range.end),
        });
    }
    tokens
}

/// First token of `source`, ignoring anything after it. Used to classify
/// preserved declarations without tokenizing arbitrary bodies.
pub fn first_token(source: &str) -> Option<Token> {
    let mut lexer = TokenKind::lexer(source);
    loop {
        match lexer.next()? {
            Ok(TokenKind::BlockComment) => continue,
            Ok(kind) => {
                let range = lexer.span();
                return Some(Token {
                    kind,
                    span: Span::new(range.start, range.end),
                });
            }
            Err(()) => return None,
        }
    }
}

/// Unquote an interpreted or raw string literal. Escapes other than `\"`
/// and `\\` are kept as written; import paths never contain them.
pub fn unquote(literal: &str) -> Option<String> {
    if literal.len() >= 2 && literal.starts_with('`') && literal.ends_with('`') {
        return Some(literal[1..literal.len() - 1].to_string());
    }
    if literal.len() >= 2 && literal.starts_with('"') && literal.ends_with('"') {
        let inner = &literal[1..literal.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(e @ ('"' | '\\')) => out.push(e),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => return None,
                }
            } else {
                out.push(c);
            }
        }
        return Some(out);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_header_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("(c *Card) Render(items ...string)"),
            vec![
                LParen, Ident, Star, Ident, RParen, Ident, LParen, Ident, Ellipsis, Ident, RParen
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(
            kinds("import ( // std\n \"fmt\" /* x */ )"),
            vec![Ident, LParen, String, RParen]
        );
    }

    #[test]
    fn test_block_comment_spans_lines_and_stars() {
        use TokenKind::*;
        assert_eq!(
            kinds("Button(title string /* label\n ** x */, n int)"),
            vec![Ident, LParen, Ident, Ident, Comma, Ident, Ident, RParen]
        );
        assert_eq!(first_token("/* doc */ import").map(|t| t.kind), Some(Ident));
    }

    #[test]
    fn test_unterminated_block_comment_fails() {
        assert_eq!(tokenize("a /* b"), Err(LexError { offset: 2 }));
    }

    #[test]
    fn test_define_and_arrow() {
        use TokenKind::*;
        assert_eq!(kinds("a := <-ch"), vec![Ident, Define, Arrow, Ident]);
    }

    #[test]
    fn test_unknown_character_fails() {
        assert_eq!(tokenize("a $ b"), Err(LexError { offset: 2 }));
    }

    #[test]
    fn test_prefix_stops_at_error() {
        let toks = tokenize_prefix("import \"fmt\"\nx $ y");
        assert_eq!(toks.len(), 3);
    }

    #[test]
    fn test_first_token_ignores_rest() {
        let tok = first_token("  import \"fmt\" $$$").unwrap();
        assert_eq!(tok.kind, TokenKind::Ident);
        assert_eq!(tok.text("  import \"fmt\" $$$"), "import");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"fmt\"").as_deref(), Some("fmt"));
        assert_eq!(unquote("`a/b`").as_deref(), Some("a/b"));
        assert_eq!(unquote("\"a\\\"b\"").as_deref(), Some("a\"b"));
        assert_eq!(unquote("fmt"), None);
    }
}
