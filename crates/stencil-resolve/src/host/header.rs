// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Function header and type expression parser.
//!
//! Parses `[ "(" receiver ")" ] Name [ "[" type params "]" ] "(" params ")" [ results ]`
//! the way the host language writes it, including grouped parameter names
//! (`a, b string`) and variadic trailing parameters.

use std::fmt;

use thiserror::Error;

use super::lexer::{tokenize, Token, TokenKind};

/// A type as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// `name`, `pkg.name`, or `name[args]`.
    Name {
        qualifier: Option<String>,
        name: String,
        args: Vec<TypeExpr>,
    },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: String, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Func { params: Vec<Param>, results: Vec<Param> },
    /// `interface{...}` kept as written.
    Interface(String),
    /// `struct{...}` kept as written.
    Struct(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncHeader {
    pub receiver: Option<Param>,
    pub name: String,
    pub type_params: Vec<Param>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct HeaderError {
    pub message: String,
    pub offset: usize,
}

/// Parse a complete function header, optionally prefixed with `func`.
pub fn parse_header(source: &str) -> Result<FuncHeader, HeaderError> {
    let mut p = HeaderParser::new(source)?;
    if p.peek_ident() == Some("func") {
        p.pos += 1;
    }
    let receiver = if p.at(TokenKind::LParen) {
        let mut recv = p.param_list()?;
        if recv.len() != 1 {
            return Err(p.error("receiver must have exactly one parameter"));
        }
        recv.pop()
    } else {
        None
    };
    let name = p.ident()?;
    let type_params = if p.at(TokenKind::LBracket) {
        p.type_param_list()?
    } else {
        Vec::new()
    };
    let params = p.param_list()?;
    let results = p.results()?;
    p.expect_end()?;
    Ok(FuncHeader {
        receiver,
        name,
        type_params,
        params,
        results,
    })
}

/// Parse a receiver written without parentheses, e.g. `c *Card`.
pub fn parse_receiver(source: &str) -> Result<Param, HeaderError> {
    let wrapped = format!("({})", source);
    let mut p = HeaderParser::new(&wrapped)?;
    let mut list = p.param_list()?;
    p.expect_end()?;
    match (list.pop(), list.is_empty()) {
        (Some(param), true) => Ok(param),
        _ => Err(HeaderError {
            message: "receiver must have exactly one parameter".into(),
            offset: 0,
        }),
    }
}

/// Parse a standalone type expression.
pub fn parse_type(source: &str) -> Result<TypeExpr, HeaderError> {
    let mut p = HeaderParser::new(source)?;
    let ty = p.type_expr()?;
    p.expect_end()?;
    Ok(ty)
}

struct HeaderParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

/// A parameter-list entry before grouping is applied.
enum Entry {
    /// A lone identifier: either a name waiting for a type, or a type.
    Bare(String),
    Named(String, TypeExpr, bool),
    Unnamed(TypeExpr, bool),
}

impl<'a> HeaderParser<'a> {
    fn new(source: &'a str) -> Result<Self, HeaderError> {
        let tokens = tokenize(source).map_err(|e| HeaderError {
            message: "unexpected character".into(),
            offset: e.offset,
        })?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn peek_at(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|t| t.kind)
    }

    fn peek_ident(&self) -> Option<&'a str> {
        match self.tokens.get(self.pos) {
            Some(t) if t.kind == TokenKind::Ident => Some(t.text(self.source)),
            _ => None,
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or(self.source.len())
    }

    fn error(&self, message: &str) -> HeaderError {
        HeaderError {
            message: message.to_string(),
            offset: self.offset(),
        }
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, HeaderError> {
        match self.tokens.get(self.pos).copied() {
            Some(tok) if tok.kind == kind => {
                self.pos += 1;
                Ok(tok)
            }
            _ => Err(self.error(&format!("expected {}", what))),
        }
    }

    fn expect_end(&self) -> Result<(), HeaderError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing tokens"))
        }
    }

    fn ident(&mut self) -> Result<String, HeaderError> {
        let tok = self.expect(TokenKind::Ident, "identifier")?;
        Ok(tok.text(self.source).to_string())
    }

    /// `( entry, entry, ... )` with grouping of bare names.
    fn param_list(&mut self) -> Result<Vec<Param>, HeaderError> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut entries = Vec::new();
        while !self.at(TokenKind::RParen) {
            entries.push(self.entry()?);
            if self.at(TokenKind::Comma) {
                self.pos += 1;
            } else if !self.at(TokenKind::RParen) {
                return Err(self.error("expected `,` or `)`"));
            }
        }
        self.pos += 1;
        self.group(entries)
    }

    fn entry(&mut self) -> Result<Entry, HeaderError> {
        if let Some(name) = self.peek_ident().filter(|n| !is_type_keyword(n)) {
            match self.peek_at(1) {
                Some(TokenKind::Comma) | Some(TokenKind::RParen) => {
                    self.pos += 1;
                    return Ok(Entry::Bare(name.to_string()));
                }
                Some(TokenKind::Dot) => {
                    // Qualified type, unnamed.
                    let ty = self.type_expr()?;
                    return Ok(Entry::Unnamed(ty, false));
                }
                Some(TokenKind::LBracket) if self.peek_at(2) != Some(TokenKind::RBracket) => {
                    // `T[A]` instantiation, unless it reads as `name [N]T`.
                    if !matches!(self.peek_at(2), Some(TokenKind::Number)) {
                        let ty = self.type_expr()?;
                        return Ok(Entry::Unnamed(ty, false));
                    }
                }
                _ => {}
            }
            self.pos += 1;
            let variadic = self.eat(TokenKind::Ellipsis);
            let ty = self.type_expr()?;
            return Ok(Entry::Named(name.to_string(), ty, variadic));
        }
        let variadic = self.eat(TokenKind::Ellipsis);
        let ty = self.type_expr()?;
        Ok(Entry::Unnamed(ty, variadic))
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Apply grouping: either every entry is named (bare names take the
    /// type of the next named entry) or none is (bare names are types).
    fn group(&self, entries: Vec<Entry>) -> Result<Vec<Param>, HeaderError> {
        let any_named = entries.iter().any(|e| matches!(e, Entry::Named(..)));
        let mut params = Vec::with_capacity(entries.len());
        if !any_named {
            for entry in entries {
                params.push(match entry {
                    Entry::Bare(name) => Param {
                        name: None,
                        ty: TypeExpr::named(None, name),
                        variadic: false,
                    },
                    Entry::Unnamed(ty, variadic) => Param {
                        name: None,
                        ty,
                        variadic,
                    },
                    Entry::Named(..) => unreachable!("no named entries"),
                });
            }
        } else {
            let mut pending: Vec<String> = Vec::new();
            for entry in entries {
                match entry {
                    Entry::Bare(name) => pending.push(name),
                    Entry::Named(name, ty, variadic) => {
                        if variadic && !pending.is_empty() {
                            return Err(self.error("cannot group names with a variadic type"));
                        }
                        for grouped in pending.drain(..) {
                            params.push(Param {
                                name: Some(grouped),
                                ty: ty.clone(),
                                variadic: false,
                            });
                        }
                        params.push(Param {
                            name: Some(name),
                            ty,
                            variadic,
                        });
                    }
                    Entry::Unnamed(..) => {
                        return Err(self.error("mixed named and unnamed parameters"));
                    }
                }
            }
            if !pending.is_empty() {
                return Err(self.error("missing parameter type"));
            }
        }
        if let Some(idx) = params.iter().position(|p| p.variadic) {
            if idx + 1 != params.len() {
                return Err(self.error("only the final parameter can be variadic"));
            }
        }
        Ok(params)
    }

    /// `[T any, K comparable]`; constraints are kept as type expressions.
    fn type_param_list(&mut self) -> Result<Vec<Param>, HeaderError> {
        self.expect(TokenKind::LBracket, "`[`")?;
        let mut params = Vec::new();
        let mut pending = Vec::new();
        while !self.at(TokenKind::RBracket) {
            let name = self.ident()?;
            if self.at(TokenKind::Comma) {
                self.pos += 1;
                pending.push(name);
                continue;
            }
            let constraint = self.constraint()?;
            for grouped in pending.drain(..) {
                params.push(Param {
                    name: Some(grouped),
                    ty: constraint.clone(),
                    variadic: false,
                });
            }
            params.push(Param {
                name: Some(name),
                ty: constraint,
                variadic: false,
            });
            if !self.eat(TokenKind::Comma) && !self.at(TokenKind::RBracket) {
                return Err(self.error("expected `,` or `]`"));
            }
        }
        self.pos += 1;
        if !pending.is_empty() || params.is_empty() {
            return Err(self.error("type parameter without constraint"));
        }
        Ok(params)
    }

    /// A constraint may be a union of approximation terms; only the first
    /// term is kept.
    fn constraint(&mut self) -> Result<TypeExpr, HeaderError> {
        self.eat(TokenKind::Tilde);
        let first = self.type_expr()?;
        while self.eat(TokenKind::Pipe) {
            self.eat(TokenKind::Tilde);
            self.type_expr()?;
        }
        Ok(first)
    }

    fn results(&mut self) -> Result<Vec<Param>, HeaderError> {
        match self.peek() {
            None => Ok(Vec::new()),
            Some(TokenKind::LParen) => self.param_list(),
            Some(_) => {
                let ty = self.type_expr()?;
                Ok(vec![Param {
                    name: None,
                    ty,
                    variadic: false,
                }])
            }
        }
    }

    fn type_expr(&mut self) -> Result<TypeExpr, HeaderError> {
        let Some(tok) = self.bump() else {
            return Err(self.error("expected type"));
        };
        match tok.kind {
            TokenKind::Star => Ok(TypeExpr::Pointer(Box::new(self.type_expr()?))),
            TokenKind::LParen => {
                let inner = self.type_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                if self.eat(TokenKind::RBracket) {
                    return Ok(TypeExpr::Slice(Box::new(self.type_expr()?)));
                }
                let len_tok = match self.bump() {
                    Some(t) if matches!(t.kind, TokenKind::Number | TokenKind::Ident | TokenKind::Ellipsis) => t,
                    _ => return Err(self.error("expected array length")),
                };
                self.expect(TokenKind::RBracket, "`]`")?;
                Ok(TypeExpr::Array {
                    len: len_tok.text(self.source).to_string(),
                    elem: Box::new(self.type_expr()?),
                })
            }
            TokenKind::Arrow => {
                let chan = self.ident()?;
                if chan != "chan" {
                    return Err(self.error("expected `chan`"));
                }
                Ok(TypeExpr::Chan {
                    dir: ChanDir::Recv,
                    elem: Box::new(self.type_expr()?),
                })
            }
            TokenKind::Ident => {
                let text = tok.text(self.source);
                match text {
                    "map" => {
                        self.expect(TokenKind::LBracket, "`[`")?;
                        let key = self.type_expr()?;
                        self.expect(TokenKind::RBracket, "`]`")?;
                        let value = self.type_expr()?;
                        Ok(TypeExpr::Map {
                            key: Box::new(key),
                            value: Box::new(value),
                        })
                    }
                    "chan" => {
                        let dir = if self.eat(TokenKind::Arrow) {
                            ChanDir::Send
                        } else {
                            ChanDir::Both
                        };
                        Ok(TypeExpr::Chan {
                            dir,
                            elem: Box::new(self.type_expr()?),
                        })
                    }
                    "func" => {
                        let params = self.param_list()?;
                        let results = match self.peek() {
                            Some(TokenKind::LParen) => self.param_list()?,
                            Some(TokenKind::Star)
                            | Some(TokenKind::LBracket)
                            | Some(TokenKind::Arrow) => vec![self.unnamed_result()?],
                            Some(TokenKind::Ident) => vec![self.unnamed_result()?],
                            _ => Vec::new(),
                        };
                        Ok(TypeExpr::Func { params, results })
                    }
                    "interface" => Ok(TypeExpr::Interface(self.braced(tok)?)),
                    "struct" => Ok(TypeExpr::Struct(self.braced(tok)?)),
                    _ => {
                        let (qualifier, name) = if self.eat(TokenKind::Dot) {
                            (Some(text.to_string()), self.ident()?)
                        } else {
                            (None, text.to_string())
                        };
                        let args = if self.at(TokenKind::LBracket)
                            && self.peek_at(1) != Some(TokenKind::RBracket)
                        {
                            self.type_args()?
                        } else {
                            Vec::new()
                        };
                        Ok(TypeExpr::Name {
                            qualifier,
                            name,
                            args,
                        })
                    }
                }
            }
            _ => Err(HeaderError {
                message: "expected type".into(),
                offset: tok.span.start,
            }),
        }
    }

    fn unnamed_result(&mut self) -> Result<Param, HeaderError> {
        Ok(Param {
            name: None,
            ty: self.type_expr()?,
            variadic: false,
        })
    }

    fn type_args(&mut self) -> Result<Vec<TypeExpr>, HeaderError> {
        self.expect(TokenKind::LBracket, "`[`")?;
        let mut args = vec![self.type_expr()?];
        while self.eat(TokenKind::Comma) {
            if self.at(TokenKind::RBracket) {
                break;
            }
            args.push(self.type_expr()?);
        }
        self.expect(TokenKind::RBracket, "`]`")?;
        Ok(args)
    }

    /// Skip a balanced `{ ... }` after `keyword`, returning the source text
    /// from the keyword through the closing brace.
    fn braced(&mut self, keyword: Token) -> Result<String, HeaderError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump() {
                Some(t) if t.kind == TokenKind::LBrace => depth += 1,
                Some(t) if t.kind == TokenKind::RBrace => depth -= 1,
                Some(_) => {}
                None => return Err(self.error("unterminated `{`")),
            }
        }
        let end = self.tokens[self.pos - 1].span.end;
        Ok(self.source[keyword.span.start..end].to_string())
    }
}

fn is_type_keyword(word: &str) -> bool {
    matches!(word, "func" | "map" | "chan" | "interface" | "struct")
}

impl TypeExpr {
    pub fn named(qualifier: Option<String>, name: impl Into<String>) -> Self {
        TypeExpr::Name {
            qualifier,
            name: name.into(),
            args: Vec::new(),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Name {
                qualifier,
                name,
                args,
            } => {
                if let Some(q) = qualifier {
                    write!(f, "{}.", q)?;
                }
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "[")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, "]")?;
                }
                Ok(())
            }
            TypeExpr::Pointer(inner) => write!(f, "*{}", inner),
            TypeExpr::Slice(elem) => write!(f, "[]{}", elem),
            TypeExpr::Array { len, elem } => write!(f, "[{}]{}", len, elem),
            TypeExpr::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeExpr::Chan { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {}", elem),
                ChanDir::Send => write!(f, "chan<- {}", elem),
                ChanDir::Recv => write!(f, "<-chan {}", elem),
            },
            TypeExpr::Func { params, results } => {
                write!(f, "func(")?;
                write_params(f, params)?;
                write!(f, ")")?;
                match results.as_slice() {
                    [] => Ok(()),
                    [single] if single.name.is_none() => write!(f, " {}", single.ty),
                    _ => {
                        write!(f, " (")?;
                        write_params(f, results)?;
                        write!(f, ")")
                    }
                }
            }
            TypeExpr::Interface(text) | TypeExpr::Struct(text) => write!(f, "{}", text),
        }
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[Param]) -> fmt::Result {
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if let Some(name) = &p.name {
            write!(f, "{} ", name)?;
        }
        if p.variadic {
            write!(f, "...")?;
        }
        write!(f, "{}", p.ty)?;
    }
    Ok(())
}
