// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Declaration-level reader for host source.
//!
//! Reads the top-level declarations of a package (package clause, imports,
//! functions, methods, types, variables and constants) and converts them
//! into the oracle's type model. Function bodies are skipped and only
//! simple initializers are typed: literals, composite literals, calls and
//! references to other package-level names.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use stencil_ast::LineMap;

use super::OracleDiagnostic;
use crate::host::lexer::{tokenize, tokenize_prefix, Token, TokenKind};
use crate::host::{parse_header, parse_imports, parse_type, FuncHeader, ImportSpec, Param, TypeExpr};
use crate::types::{
    BasicKind, Field, Method, NamedType, PackageRef, PackageScope, Signature, Symbol, SymbolKind,
    Type, Var,
};

/// One file of a package.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub path: &'a Path,
    pub text: &'a str,
}

/// The result of reading a package.
#[derive(Debug, Clone)]
pub struct PackageSource {
    /// Name from the first package clause, if any file had one.
    pub name: Option<String>,
    pub scope: PackageScope,
    pub diagnostics: Vec<OracleDiagnostic>,
}

/// Resolves an import path to the scope of the imported package.
pub type ImportFn<'a> = dyn Fn(&str) -> Option<Rc<PackageScope>> + 'a;

/// Read and type a package from its files.
///
/// `fallback_name` is used when no file has a package clause.
pub fn read_package(
    path: &str,
    fallback_name: &str,
    files: &[SourceFile<'_>],
    imports: &ImportFn<'_>,
) -> PackageSource {
    let mut decls = Vec::new();
    let mut parsed = Vec::with_capacity(files.len());
    let mut diagnostics = Vec::new();
    for (idx, file) in files.iter().enumerate() {
        parsed.push(read_file(idx, file, &mut decls, &mut diagnostics));
    }
    let name = parsed.iter().find_map(|f| f.package.clone());
    let package = PackageRef {
        path: path.to_string(),
        name: name.clone().unwrap_or_else(|| fallback_name.to_string()),
    };
    let mut builder = Builder::new(package, parsed, decls, imports);
    builder.diagnostics = diagnostics;
    let scope = builder.build();
    PackageSource {
        name,
        scope,
        diagnostics: builder.diagnostics,
    }
}

// ============================================================================
// Declarations
// ============================================================================

struct FileInfo {
    path: PathBuf,
    lines: LineMap,
    package: Option<String>,
    /// Import specs with the absolute offset of their path literal.
    imports: Vec<(ImportSpec, usize)>,
    /// Identifiers used as `name.` anywhere in the file.
    qualifiers: HashSet<String>,
}

#[derive(Debug, Clone)]
struct Decl {
    name: String,
    file: usize,
    offset: usize,
    kind: DeclKind,
}

#[derive(Debug, Clone)]
enum DeclKind {
    Func(FuncHeader),
    Type {
        type_params: Vec<String>,
        alias: bool,
        body: TypeBody,
    },
    Var {
        ty: Option<TypeExpr>,
        init: Option<Init>,
    },
    Const {
        ty: Option<TypeExpr>,
        init: Option<Init>,
    },
}

#[derive(Debug, Clone)]
struct Init {
    text: String,
    /// Which result of a multi-value initializer this name takes.
    index: usize,
}

#[derive(Debug, Clone)]
enum TypeBody {
    Expr(TypeExpr),
    Struct(Vec<FieldDecl>),
    Interface(Vec<InterfaceElem>),
}

#[derive(Debug, Clone)]
struct FieldDecl {
    /// `None` for an embedded field.
    name: Option<String>,
    ty: TypeExpr,
}

#[derive(Debug, Clone)]
enum InterfaceElem {
    Method(FuncHeader),
    Embed(TypeExpr),
}

/// Collects declarations and parse diagnostics for one file.
struct Reader<'a> {
    file: usize,
    path: &'a Path,
    text: &'a str,
    lines: LineMap,
    decls: &'a mut Vec<Decl>,
    diagnostics: &'a mut Vec<OracleDiagnostic>,
}

fn read_file(
    idx: usize,
    file: &SourceFile<'_>,
    decls: &mut Vec<Decl>,
    diagnostics: &mut Vec<OracleDiagnostic>,
) -> FileInfo {
    let text = file.text;
    let lines = LineMap::new(text);
    let tokens = match tokenize(text) {
        Ok(tokens) => tokens,
        Err(e) => {
            diagnostics.push(OracleDiagnostic::at(
                file.path,
                lines.position(e.offset),
                "invalid character",
            ));
            tokenize_prefix(text)
        }
    };

    let qualifiers = tokens
        .windows(2)
        .filter(|w| w[0].kind == TokenKind::Ident && w[1].kind == TokenKind::Dot)
        .map(|w| w[0].text(text).to_string())
        .collect();

    let mut info = FileInfo {
        path: file.path.to_path_buf(),
        lines: lines.clone(),
        package: None,
        imports: Vec::new(),
        qualifiers,
    };
    let mut reader = Reader {
        file: idx,
        path: file.path,
        text,
        lines,
        decls,
        diagnostics,
    };

    for stmt in split_statements(text, &tokens) {
        let head = stmt[0];
        let keyword = if head.kind == TokenKind::Ident {
            head.text(text)
        } else {
            ""
        };
        match keyword {
            "package" => match stmt.get(1) {
                Some(t) if t.kind == TokenKind::Ident => info.package = Some(t.text(text).to_string()),
                _ => reader.error(head.span.start, "syntax error: package statement must be first"),
            },
            "import" => {
                let base = head.span.start;
                for decl in parse_imports(slice_text(text, stmt)) {
                    for spec in decl.specs {
                        let offset = base + spec.path_span.start;
                        info.imports.push((spec, offset));
                    }
                }
            }
            "func" => reader.func(stmt),
            "type" => reader.group(stmt, Reader::type_spec),
            "var" => reader.group(stmt, |r, s| r.value_spec(s, false, &mut None)),
            "const" => {
                let mut previous = None;
                reader.group(stmt, |r, s| r.value_spec(s, true, &mut previous));
            }
            _ => reader.error(
                head.span.start,
                "syntax error: non-declaration statement outside function body",
            ),
        }
    }
    info
}

impl Reader<'_> {
    fn error(&mut self, offset: usize, message: impl Into<String>) {
        self.diagnostics.push(OracleDiagnostic::at(
            self.path,
            self.lines.position(offset),
            message,
        ));
    }

    fn push(&mut self, name: String, offset: usize, kind: DeclKind) {
        self.decls.push(Decl {
            name,
            file: self.file,
            offset,
            kind,
        });
    }

    /// `kw spec` or `kw ( spec; spec )`.
    fn group(&mut self, stmt: &[Token], mut spec: impl FnMut(&mut Self, &[Token])) {
        let rest = &stmt[1..];
        let grouped = rest.first().map(|t| t.kind) == Some(TokenKind::LParen)
            && rest.last().map(|t| t.kind) == Some(TokenKind::RParen);
        if grouped {
            let text = self.text;
            for inner in split_statements(text, &rest[1..rest.len() - 1]) {
                spec(self, inner);
            }
        } else if rest.is_empty() {
            self.error(stmt[0].span.end, "syntax error: unexpected newline");
        } else {
            spec(self, rest);
        }
    }

    fn func(&mut self, stmt: &[Token]) {
        let header = match stmt.last() {
            Some(last) if last.kind == TokenKind::RBrace && stmt.len() > 1 => {
                match matching_open(stmt, stmt.len() - 1) {
                    Some(open) => &stmt[..open],
                    None => stmt,
                }
            }
            _ => stmt,
        };
        let base = stmt[0].span.start;
        match parse_header(slice_text(self.text, header)) {
            Ok(h) => {
                let name = h.name.clone();
                self.push(name, base, DeclKind::Func(h));
            }
            Err(e) => self.error(base + e.offset, format!("syntax error: {}", e.message)),
        }
    }

    fn type_spec(&mut self, spec: &[Token]) {
        let text = self.text;
        let start = spec[0].span.start;
        if spec[0].kind != TokenKind::Ident {
            self.error(start, "syntax error: expected type name");
            return;
        }
        let name = spec[0].text(text).to_string();
        let mut i = 1;

        let mut type_params = Vec::new();
        let opens_params = spec.get(1).map(|t| t.kind) == Some(TokenKind::LBracket)
            && spec.get(2).map(|t| t.kind) == Some(TokenKind::Ident)
            && !matches!(spec.get(3).map(|t| t.kind), Some(TokenKind::RBracket) | None);
        if opens_params {
            let Some(close) = matching_close(spec, 1) else {
                self.error(spec[1].span.start, "syntax error: unclosed type parameter list");
                return;
            };
            let header = format!("{}{}()", name, slice_text(text, &spec[1..=close]));
            match parse_header(&header) {
                Ok(h) => type_params = h.type_params.into_iter().filter_map(|p| p.name).collect(),
                Err(e) => {
                    self.error(start, format!("syntax error: {}", e.message));
                    return;
                }
            }
            i = close + 1;
        }

        let alias = spec.get(i).map(|t| t.kind) == Some(TokenKind::Assign);
        if alias {
            i += 1;
        }
        let rest = &spec[i..];
        if rest.is_empty() {
            self.error(spec[0].span.end, "syntax error: missing type");
            return;
        }
        let body = match self.type_body(rest) {
            Some(body) => body,
            None => return,
        };
        self.push(
            name,
            start,
            DeclKind::Type {
                type_params,
                alias,
                body,
            },
        );
    }

    fn type_body(&mut self, toks: &[Token]) -> Option<TypeBody> {
        let text = self.text;
        let keyword = toks[0].text(text);
        let braced = toks.get(1).map(|t| t.kind) == Some(TokenKind::LBrace)
            && toks.last().map(|t| t.kind) == Some(TokenKind::RBrace);
        if braced && keyword == "struct" {
            return Some(TypeBody::Struct(self.fields(&toks[2..toks.len() - 1])));
        }
        if braced && keyword == "interface" {
            return Some(TypeBody::Interface(self.interface_elems(&toks[2..toks.len() - 1])));
        }
        match parse_type(slice_text(text, toks)) {
            Ok(ty) => Some(TypeBody::Expr(ty)),
            Err(e) => {
                self.error(toks[0].span.start + e.offset, format!("syntax error: {}", e.message));
                None
            }
        }
    }

    fn fields(&mut self, toks: &[Token]) -> Vec<FieldDecl> {
        let text = self.text;
        let mut fields = Vec::new();
        for line in split_statements(text, toks) {
            let line = match line.last() {
                Some(t) if matches!(t.kind, TokenKind::String | TokenKind::RawString) => {
                    &line[..line.len() - 1]
                }
                _ => line,
            };
            if line.is_empty() {
                continue;
            }
            let embedded = line.len() == 1
                || line[0].kind == TokenKind::Star
                || line[1].kind == TokenKind::Dot
                || (line[1].kind == TokenKind::LBracket
                    && line.last().map(|t| t.kind) == Some(TokenKind::RBracket));
            if embedded {
                match parse_type(slice_text(text, line)) {
                    Ok(ty) => fields.push(FieldDecl { name: None, ty }),
                    Err(e) => self.error(line[0].span.start + e.offset, format!("syntax error: {}", e.message)),
                }
                continue;
            }
            let mut names = Vec::new();
            let mut i = 0;
            while i < line.len() && line[i].kind == TokenKind::Ident {
                names.push(line[i].text(text).to_string());
                if line.get(i + 1).map(|t| t.kind) == Some(TokenKind::Comma) {
                    i += 2;
                } else {
                    i += 1;
                    break;
                }
            }
            if i >= line.len() {
                self.error(line[0].span.start, "syntax error: missing field type");
                continue;
            }
            match parse_type(slice_text(text, &line[i..])) {
                Ok(ty) => {
                    for name in names {
                        fields.push(FieldDecl {
                            name: Some(name),
                            ty: ty.clone(),
                        });
                    }
                }
                Err(e) => self.error(line[i].span.start + e.offset, format!("syntax error: {}", e.message)),
            }
        }
        fields
    }

    fn interface_elems(&mut self, toks: &[Token]) -> Vec<InterfaceElem> {
        let text = self.text;
        let mut elems = Vec::new();
        for line in split_statements(text, toks) {
            let is_method =
                line[0].kind == TokenKind::Ident && line.get(1).map(|t| t.kind) == Some(TokenKind::LParen);
            if is_method {
                match parse_header(slice_text(text, line)) {
                    Ok(h) => elems.push(InterfaceElem::Method(h)),
                    Err(e) => self.error(line[0].span.start + e.offset, format!("syntax error: {}", e.message)),
                }
            } else if line.iter().any(|t| matches!(t.kind, TokenKind::Pipe | TokenKind::Tilde)) {
                // Type-set constraint terms carry no methods.
            } else {
                match parse_type(slice_text(text, line)) {
                    Ok(ty) => elems.push(InterfaceElem::Embed(ty)),
                    Err(e) => self.error(line[0].span.start + e.offset, format!("syntax error: {}", e.message)),
                }
            }
        }
        elems
    }

    /// `names [type] [= values]`. Inside a `const` group a spec with neither
    /// type nor values repeats the previous one.
    fn value_spec(
        &mut self,
        spec: &[Token],
        constant: bool,
        previous: &mut Option<(Option<TypeExpr>, Vec<String>)>,
    ) {
        let text = self.text;
        let start = spec[0].span.start;
        let mut names = Vec::new();
        let mut i = 0;
        while i < spec.len() && spec[i].kind == TokenKind::Ident {
            names.push(spec[i].text(text).to_string());
            if spec.get(i + 1).map(|t| t.kind) == Some(TokenKind::Comma) {
                i += 2;
            } else {
                i += 1;
                break;
            }
        }
        if names.is_empty() {
            self.error(start, "syntax error: expected name");
            return;
        }
        let rest = &spec[i..];
        let assign = rest.iter().position(|t| t.kind == TokenKind::Assign);
        let (type_toks, value_toks) = match assign {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };
        let ty = if type_toks.is_empty() {
            None
        } else {
            match parse_type(slice_text(text, type_toks)) {
                Ok(ty) => Some(ty),
                Err(e) => {
                    self.error(type_toks[0].span.start + e.offset, format!("syntax error: {}", e.message));
                    return;
                }
            }
        };
        let values: Vec<String> = match value_toks {
            Some(toks) if !toks.is_empty() => split_commas(toks)
                .into_iter()
                .map(|v| slice_text(text, v).to_string())
                .collect(),
            Some(_) => {
                self.error(start, "syntax error: missing initializer");
                return;
            }
            None => Vec::new(),
        };

        let (ty, values) = if constant && ty.is_none() && values.is_empty() {
            match previous.clone() {
                Some(prev) => prev,
                None => {
                    self.error(start, "missing init expr for const declaration");
                    return;
                }
            }
        } else {
            (ty, values)
        };
        if constant {
            *previous = Some((ty.clone(), values.clone()));
        }

        for (k, name) in names.into_iter().enumerate() {
            let init = if values.len() == 1 {
                Some(Init {
                    text: values[0].clone(),
                    index: k,
                })
            } else {
                values.get(k).map(|v| Init {
                    text: v.clone(),
                    index: 0,
                })
            };
            let kind = if constant {
                DeclKind::Const {
                    ty: ty.clone(),
                    init,
                }
            } else {
                DeclKind::Var {
                    ty: ty.clone(),
                    init,
                }
            };
            self.push(name, start, kind);
        }
    }
}

// ============================================================================
// Token helpers
// ============================================================================

fn slice_text<'a>(text: &'a str, toks: &[Token]) -> &'a str {
    match (toks.first(), toks.last()) {
        (Some(first), Some(last)) => &text[first.span.start..last.span.end],
        _ => "",
    }
}

fn newline_between(text: &str, prev: &Token, next: &Token) -> bool {
    text[prev.span.end..next.span.start].contains('\n')
}

fn opens(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace)
}

fn closes(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace)
}

/// Split tokens into statements: a statement ends at a newline or `;` at
/// bracket depth zero.
fn split_statements<'t>(text: &str, toks: &'t [Token]) -> Vec<&'t [Token]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut depth = 0i32;
    for i in 0..toks.len() {
        if depth == 0 && i > start && newline_between(text, &toks[i - 1], &toks[i]) {
            out.push(&toks[start..i]);
            start = i;
        }
        let kind = toks[i].kind;
        if opens(kind) {
            depth += 1;
        } else if closes(kind) {
            depth -= 1;
        } else if kind == TokenKind::Semi && depth == 0 {
            if i > start {
                out.push(&toks[start..i]);
            }
            start = i + 1;
        }
    }
    if start < toks.len() {
        out.push(&toks[start..]);
    }
    out
}

fn split_commas(toks: &[Token]) -> Vec<&[Token]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut depth = 0i32;
    for (i, tok) in toks.iter().enumerate() {
        if opens(tok.kind) {
            depth += 1;
        } else if closes(tok.kind) {
            depth -= 1;
        } else if tok.kind == TokenKind::Comma && depth == 0 {
            out.push(&toks[start..i]);
            start = i + 1;
        }
    }
    out.push(&toks[start..]);
    out.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Index of the bracket opening the one that closes at `close`.
fn matching_open(toks: &[Token], close: usize) -> Option<usize> {
    let mut depth = 0i32;
    for i in (0..=close).rev() {
        let kind = toks[i].kind;
        if closes(kind) {
            depth += 1;
        } else if opens(kind) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Index of the bracket closing the one that opens at `open`.
fn matching_close(toks: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, tok) in toks.iter().enumerate().skip(open) {
        if opens(tok.kind) {
            depth += 1;
        } else if closes(tok.kind) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

// ============================================================================
// Typing
// ============================================================================

struct Builder<'a> {
    package: PackageRef,
    files: Vec<FileInfo>,
    decls: Vec<Decl>,
    /// Package-level names (functions, types, variables, constants) to decls.
    names: IndexMap<String, usize>,
    /// Receiver base type name to method decls.
    methods: IndexMap<String, Vec<usize>>,
    imports: &'a ImportFn<'a>,
    imported: HashMap<String, Option<Rc<PackageScope>>>,
    named: HashMap<String, Rc<NamedType>>,
    building: Vec<String>,
    values: HashMap<String, Type>,
    valuing: Vec<String>,
    diagnostics: Vec<OracleDiagnostic>,
}

impl<'a> Builder<'a> {
    fn new(
        package: PackageRef,
        files: Vec<FileInfo>,
        decls: Vec<Decl>,
        imports: &'a ImportFn<'a>,
    ) -> Self {
        Self {
            package,
            files,
            decls,
            names: IndexMap::new(),
            methods: IndexMap::new(),
            imports,
            imported: HashMap::new(),
            named: HashMap::new(),
            building: Vec::new(),
            values: HashMap::new(),
            valuing: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, file: usize, offset: usize, message: impl Into<String>) {
        let info = &self.files[file];
        self.diagnostics.push(OracleDiagnostic::at(
            info.path.clone(),
            info.lines.position(offset),
            message,
        ));
    }

    fn build(&mut self) -> PackageScope {
        self.check_imports();
        self.index();

        let mut scope = PackageScope::new();
        let order: Vec<(String, usize)> = self.names.iter().map(|(n, &i)| (n.clone(), i)).collect();
        for (name, idx) in order {
            let kind = match self.decls[idx].kind.clone() {
                DeclKind::Func(h) => {
                    let tparams: Vec<String> = h.type_params.iter().filter_map(|p| p.name.clone()).collect();
                    let file = self.decls[idx].file;
                    let offset = self.decls[idx].offset;
                    SymbolKind::Func(self.signature(&h.params, &h.results, file, &tparams, offset))
                }
                DeclKind::Type { .. } => match self.named_type(&name) {
                    Type::Named(n) => SymbolKind::TypeName(n),
                    _ => continue,
                },
                DeclKind::Var { .. } => SymbolKind::Var(self.value_type(&name)),
                DeclKind::Const { .. } => SymbolKind::Const(self.value_type(&name)),
            };
            scope.insert(name, kind);
        }
        scope
    }

    fn check_imports(&mut self) {
        for file in 0..self.files.len() {
            let imports = self.files[file].imports.clone();
            for (spec, offset) in imports {
                if spec.path == "unsafe" || spec.path == "C" {
                    continue;
                }
                if self.import(&spec.path).is_none() {
                    self.error(
                        file,
                        offset,
                        format!("could not import {} (no package found)", spec.path),
                    );
                    continue;
                }
                if let Some(local) = spec.local_name() {
                    if !self.files[file].qualifiers.contains(local) {
                        let message = match &spec.name {
                            Some(alias) => format!("\"{}\" imported as {} and not used", spec.path, alias),
                            None => format!("\"{}\" imported and not used", spec.path),
                        };
                        self.error(file, offset, message);
                    }
                }
            }
        }
    }

    fn index(&mut self) {
        for idx in 0..self.decls.len() {
            let decl = &self.decls[idx];
            if let DeclKind::Func(h) = &decl.kind {
                if let Some(recv) = &h.receiver {
                    match receiver_base(&recv.ty) {
                        Some((base, _, _)) => self.methods.entry(base).or_default().push(idx),
                        None => {
                            let message = format!("invalid receiver type {}", recv.ty);
                            let (file, offset) = (decl.file, decl.offset);
                            self.error(file, offset, message);
                        }
                    }
                    continue;
                }
            }
            if decl.name == "_" || decl.name == "init" {
                continue;
            }
            if self.names.contains_key(&decl.name) {
                let (file, offset, name) = (decl.file, decl.offset, decl.name.clone());
                self.error(file, offset, format!("{} redeclared in this block", name));
                continue;
            }
            self.names.insert(decl.name.clone(), idx);
        }
        let receivers: Vec<String> = self.methods.keys().cloned().collect();
        for base in receivers {
            let declared = self
                .names
                .get(&base)
                .is_some_and(|&i| matches!(self.decls[i].kind, DeclKind::Type { .. }));
            if !declared {
                let first = self.methods[&base][0];
                let (file, offset) = (self.decls[first].file, self.decls[first].offset);
                self.error(file, offset, format!("undefined: {}", base));
            }
        }
    }

    fn import(&mut self, path: &str) -> Option<Rc<PackageScope>> {
        if let Some(hit) = self.imported.get(path) {
            return hit.clone();
        }
        let scope = (self.imports)(path);
        self.imported.insert(path.to_string(), scope.clone());
        scope
    }

    fn import_scope(&mut self, file: usize, qualifier: &str) -> Option<(String, Rc<PackageScope>)> {
        let path = self.files[file]
            .imports
            .iter()
            .find(|(spec, _)| spec.local_name() == Some(qualifier))
            .map(|(spec, _)| spec.path.clone())?;
        let scope = self.import(&path)?;
        Some((path, scope))
    }

    fn qualified_symbol(&mut self, file: usize, qualifier: &str, name: &str) -> Option<Symbol> {
        let (_, scope) = self.import_scope(file, qualifier)?;
        scope.lookup(name).cloned()
    }

    fn convert(&mut self, expr: &TypeExpr, file: usize, tparams: &[String], offset: usize) -> Type {
        match expr {
            TypeExpr::Name {
                qualifier: None,
                name,
                ..
            } => {
                if tparams.iter().any(|p| p == name) {
                    return Type::TypeParam(name.clone());
                }
                if let Some(kind) = BasicKind::from_name(name) {
                    return Type::Basic(kind);
                }
                match name.as_str() {
                    "error" => return Type::error(),
                    "any" | "comparable" => return Type::any(),
                    _ => {}
                }
                let is_type = self
                    .names
                    .get(name)
                    .is_some_and(|&i| matches!(self.decls[i].kind, DeclKind::Type { .. }));
                if is_type {
                    return self.named_type(name);
                }
                self.error(file, offset, format!("undefined: {}", name));
                Type::Invalid
            }
            TypeExpr::Name {
                qualifier: Some(q),
                name,
                ..
            } => {
                let is_unsafe = self.files[file]
                    .imports
                    .iter()
                    .any(|(spec, _)| spec.path == "unsafe" && spec.local_name() == Some(q.as_str()));
                if is_unsafe && name == "Pointer" {
                    return Type::Basic(BasicKind::UnsafePointer);
                }
                match self.qualified_symbol(file, q, name) {
                    Some(Symbol {
                        kind: SymbolKind::TypeName(n),
                        ..
                    }) => Type::Named(n),
                    _ => {
                        self.error(file, offset, format!("undefined: {}.{}", q, name));
                        Type::Invalid
                    }
                }
            }
            TypeExpr::Pointer(inner) => Type::pointer(self.convert(inner, file, tparams, offset)),
            TypeExpr::Slice(elem) => Type::slice(self.convert(elem, file, tparams, offset)),
            TypeExpr::Array { len, elem } => Type::Array(
                len.parse().unwrap_or(0),
                Box::new(self.convert(elem, file, tparams, offset)),
            ),
            TypeExpr::Map { key, value } => {
                let key = self.convert(key, file, tparams, offset);
                Type::map(key, self.convert(value, file, tparams, offset))
            }
            TypeExpr::Chan { elem, .. } => Type::Chan(Box::new(self.convert(elem, file, tparams, offset))),
            TypeExpr::Func { params, results } => {
                Type::func(self.signature(params, results, file, tparams, offset))
            }
            TypeExpr::Interface(text) => {
                let elems = self.anonymous_body(text, file, offset, |r, toks| {
                    TypeBody::Interface(r.interface_elems(toks))
                });
                self.underlying(elems, file, tparams, offset)
            }
            TypeExpr::Struct(text) => {
                let fields = self.anonymous_body(text, file, offset, |r, toks| TypeBody::Struct(r.fields(toks)));
                self.underlying(fields, file, tparams, offset)
            }
        }
    }

    /// Re-read the body of an anonymous `struct{...}` or `interface{...}`.
    fn anonymous_body(
        &mut self,
        text: &str,
        file: usize,
        offset: usize,
        read: impl FnOnce(&mut Reader<'_>, &[Token]) -> TypeBody,
    ) -> TypeBody {
        let toks = tokenize_prefix(text);
        let inner = if toks.len() >= 3 { &toks[2..toks.len() - 1] } else { &[][..] };
        let mut decls = Vec::new();
        let mut diagnostics = Vec::new();
        let path = self.files[file].path.clone();
        let body = {
            let mut reader = Reader {
                file,
                path: &path,
                text,
                lines: LineMap::new(text),
                decls: &mut decls,
                diagnostics: &mut diagnostics,
            };
            read(&mut reader, inner)
        };
        if !diagnostics.is_empty() {
            self.error(file, offset, format!("syntax error in {}", text));
        }
        body
    }

    fn underlying(&mut self, body: TypeBody, file: usize, tparams: &[String], offset: usize) -> Type {
        match body {
            TypeBody::Expr(expr) => self.convert(&expr, file, tparams, offset),
            TypeBody::Struct(fields) => Type::Struct(
                fields
                    .into_iter()
                    .map(|f| {
                        let ty = self.convert(&f.ty, file, tparams, offset);
                        match f.name {
                            Some(name) => Field {
                                name,
                                ty,
                                embedded: false,
                            },
                            None => Field {
                                name: embedded_name(&f.ty),
                                ty,
                                embedded: true,
                            },
                        }
                    })
                    .collect(),
            ),
            TypeBody::Interface(elems) => {
                let mut methods = Vec::new();
                for elem in elems {
                    match elem {
                        InterfaceElem::Method(h) => methods.push(Method {
                            signature: self.signature(&h.params, &h.results, file, tparams, offset),
                            name: h.name,
                            pointer_receiver: false,
                        }),
                        InterfaceElem::Embed(expr) => {
                            let embedded = self.convert(&expr, file, tparams, offset);
                            if let Type::Interface(inner) = embedded.underlying() {
                                methods.extend(inner.iter().cloned());
                            }
                        }
                    }
                }
                Type::Interface(methods)
            }
        }
    }

    fn signature(
        &mut self,
        params: &[Param],
        results: &[Param],
        file: usize,
        tparams: &[String],
        offset: usize,
    ) -> Signature {
        let variadic = params.last().is_some_and(|p| p.variadic);
        let mut sig = Signature {
            params: Vec::with_capacity(params.len()),
            results: Vec::with_capacity(results.len()),
            variadic,
        };
        for p in params {
            let mut ty = self.convert(&p.ty, file, tparams, offset);
            if p.variadic {
                ty = Type::slice(ty);
            }
            sig.params.push(Var::new(p.name.clone().unwrap_or_default(), ty));
        }
        for r in results {
            let ty = self.convert(&r.ty, file, tparams, offset);
            sig.results.push(Var::new(r.name.clone().unwrap_or_default(), ty));
        }
        sig
    }

    /// The named type declared as `name`, built on first use. A reference
    /// back to a type still being built yields a shell with the same
    /// identity but no structure.
    fn named_type(&mut self, name: &str) -> Type {
        if let Some(n) = self.named.get(name) {
            return Type::Named(n.clone());
        }
        if self.building.iter().any(|b| b == name) {
            return Type::named(NamedType {
                package: Some(self.package.clone()),
                name: name.to_string(),
                underlying: Type::Invalid,
                methods: Vec::new(),
            });
        }
        let Some(&idx) = self.names.get(name) else {
            return Type::Invalid;
        };
        let Decl {
            file, offset, kind, ..
        } = self.decls[idx].clone();
        let DeclKind::Type {
            type_params,
            alias,
            body,
        } = kind
        else {
            return Type::Invalid;
        };

        self.building.push(name.to_string());
        let converted = self.underlying(body, file, &type_params, offset);
        let result = if alias {
            match converted {
                Type::Named(n) => n,
                other => Rc::new(NamedType {
                    package: Some(self.package.clone()),
                    name: name.to_string(),
                    underlying: other,
                    methods: Vec::new(),
                }),
            }
        } else {
            let methods = self.methods_of(name);
            Rc::new(NamedType {
                package: Some(self.package.clone()),
                name: name.to_string(),
                underlying: converted.underlying().clone(),
                methods,
            })
        };
        self.building.pop();
        self.named.insert(name.to_string(), result.clone());
        Type::Named(result)
    }

    fn methods_of(&mut self, name: &str) -> Vec<Method> {
        let indices = self.methods.get(name).cloned().unwrap_or_default();
        let mut methods = Vec::with_capacity(indices.len());
        for idx in indices {
            let Decl {
                file, offset, kind, ..
            } = self.decls[idx].clone();
            let DeclKind::Func(h) = kind else { continue };
            let Some((_, pointer, tparams)) = h.receiver.as_ref().and_then(|r| receiver_base(&r.ty)) else {
                continue;
            };
            methods.push(Method {
                signature: self.signature(&h.params, &h.results, file, &tparams, offset),
                name: h.name,
                pointer_receiver: pointer,
            });
        }
        methods
    }

    /// Type of a package-level variable or constant.
    fn value_type(&mut self, name: &str) -> Type {
        if let Some(ty) = self.values.get(name) {
            return ty.clone();
        }
        if self.valuing.iter().any(|v| v == name) {
            return Type::Invalid;
        }
        let Some(&idx) = self.names.get(name) else {
            return Type::Invalid;
        };
        let Decl {
            file, offset, kind, ..
        } = self.decls[idx].clone();
        self.valuing.push(name.to_string());
        let ty = match kind {
            DeclKind::Var { ty: Some(ty), .. } | DeclKind::Const { ty: Some(ty), .. } => {
                self.convert(&ty, file, &[], offset)
            }
            DeclKind::Var { init: Some(init), .. } | DeclKind::Const { init: Some(init), .. } => {
                self.infer(&init, file)
            }
            _ => Type::Invalid,
        };
        self.valuing.pop();
        self.values.insert(name.to_string(), ty.clone());
        ty
    }

    /// Type of a simple initializer expression, or `Invalid`.
    fn infer(&mut self, init: &Init, file: usize) -> Type {
        let toks = tokenize_prefix(&init.text);
        let text = init.text.as_str();
        let Some(first) = toks.first() else {
            return Type::Invalid;
        };
        match first.kind {
            TokenKind::String | TokenKind::RawString => return Type::Basic(BasicKind::String),
            TokenKind::Rune => return Type::Basic(BasicKind::Int32),
            TokenKind::Number if toks.len() == 1 => {
                let literal = first.text(text);
                let float = literal.contains('.') && !literal.starts_with("0x");
                return Type::Basic(if float { BasicKind::Float64 } else { BasicKind::Int });
            }
            TokenKind::Op if first.text(text) == "&" => {
                let inner = Init {
                    text: text[first.span.end..].to_string(),
                    index: init.index,
                };
                return match self.infer(&inner, file) {
                    Type::Invalid => Type::Invalid,
                    ty => Type::pointer(ty),
                };
            }
            TokenKind::Ident => {}
            _ => return Type::Invalid,
        }

        let (qualifier, name, next) = match (toks.get(1), toks.get(2)) {
            (Some(dot), Some(second)) if dot.kind == TokenKind::Dot && second.kind == TokenKind::Ident => {
                (Some(first.text(text)), second.text(text), 3)
            }
            _ => (None, first.text(text), 1),
        };
        let follow = toks.get(next).map(|t| t.kind);
        if next == toks.len() && qualifier.is_none() {
            match name {
                "true" | "false" => return Type::Basic(BasicKind::Bool),
                "iota" => return Type::Basic(BasicKind::Int),
                _ => {}
            }
        }

        let symbol = match qualifier {
            Some(q) => self.qualified_symbol(file, q, name),
            None => self.local_symbol(name),
        };
        let Some(symbol) = symbol else {
            return Type::Invalid;
        };
        match (symbol.kind, follow) {
            (SymbolKind::TypeName(n), Some(TokenKind::LBrace))
            | (SymbolKind::TypeName(n), Some(TokenKind::LParen)) => Type::Named(n),
            (SymbolKind::Func(sig), Some(TokenKind::LParen)) => sig
                .results
                .get(init.index)
                .map(|r| r.ty.clone())
                .unwrap_or(Type::Invalid),
            (SymbolKind::Func(sig), None) => Type::func(sig),
            (SymbolKind::Var(ty), None) | (SymbolKind::Const(ty), None) => ty,
            _ => Type::Invalid,
        }
    }

    fn local_symbol(&mut self, name: &str) -> Option<Symbol> {
        let &idx = self.names.get(name)?;
        let kind = match self.decls[idx].kind.clone() {
            DeclKind::Func(h) => {
                let file = self.decls[idx].file;
                let tparams: Vec<String> = h.type_params.iter().filter_map(|p| p.name.clone()).collect();
                let offset = self.decls[idx].offset;
                SymbolKind::Func(self.signature(&h.params, &h.results, file, &tparams, offset))
            }
            DeclKind::Type { .. } => match self.named_type(name) {
                Type::Named(n) => SymbolKind::TypeName(n),
                _ => return None,
            },
            DeclKind::Var { .. } => SymbolKind::Var(self.value_type(name)),
            DeclKind::Const { .. } => SymbolKind::Const(self.value_type(name)),
        };
        Some(Symbol {
            name: name.to_string(),
            kind,
        })
    }
}

/// Base type name of a receiver, whether it is a pointer, and its type
/// parameter names.
fn receiver_base(ty: &TypeExpr) -> Option<(String, bool, Vec<String>)> {
    let (inner, pointer) = match ty {
        TypeExpr::Pointer(inner) => (inner.as_ref(), true),
        other => (other, false),
    };
    match inner {
        TypeExpr::Name {
            qualifier: None,
            name,
            args,
        } => {
            let tparams = args
                .iter()
                .filter_map(|a| match a {
                    TypeExpr::Name { name, .. } => Some(name.clone()),
                    _ => None,
                })
                .collect();
            Some((name.clone(), pointer, tparams))
        }
        _ => None,
    }
}

/// Field name of an embedded field: the type name without qualifier,
/// pointer or type arguments.
fn embedded_name(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Pointer(inner) => embedded_name(inner),
        TypeExpr::Name { name, .. } => name.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> PackageSource {
        read_with(text, &|_| None)
    }

    fn read_with(text: &str, imports: &ImportFn<'_>) -> PackageSource {
        let path = Path::new("ui/types.go");
        read_package("example.com/ui", "ui", &[SourceFile { path, text }], imports)
    }

    fn messages(src: &PackageSource) -> Vec<String> {
        src.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn test_funcs_and_package_name() {
        let src = read("package widgets\n\nfunc Button(title string) {}\nfunc List(items ...string) (n int, err error) {\n\treturn 0, nil\n}\n");
        assert_eq!(src.name.as_deref(), Some("widgets"));
        assert!(src.diagnostics.is_empty(), "{:?}", src.diagnostics);
        let SymbolKind::Func(sig) = &src.scope.lookup("List").unwrap().kind else {
            panic!("expected func");
        };
        assert!(sig.variadic);
        assert_eq!(sig.params[0].ty.to_string(), "[]string");
        assert_eq!(sig.results.len(), 2);
    }

    #[test]
    fn test_struct_fields_with_tags_and_embedding() {
        let src = read(
            "package ui\n\ntype Base struct{ ID string }\n\ntype Card struct {\n\tBase\n\tName, Title string `json:\"name\"`\n\tenabled bool\n\tItems []string\n}\n",
        );
        let SymbolKind::TypeName(card) = &src.scope.lookup("Card").unwrap().kind else {
            panic!("expected type");
        };
        let Type::Struct(fields) = &card.underlying else {
            panic!("expected struct");
        };
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Base", "Name", "Title", "enabled", "Items"]);
        assert!(fields[0].embedded);
        assert_eq!(fields[4].ty.to_string(), "[]string");
    }

    #[test]
    fn test_methods_attach_with_receiver_kind() {
        let src = read("package ui\n\ntype Card struct{}\n\nfunc (c Card) Title() string { return \"\" }\nfunc (c *Card) SetTitle(t string) {}\n");
        let SymbolKind::TypeName(card) = &src.scope.lookup("Card").unwrap().kind else {
            panic!("expected type");
        };
        assert_eq!(card.methods.len(), 2);
        assert!(!card.methods[0].pointer_receiver);
        assert!(card.methods[1].pointer_receiver);
        assert!(src.scope.lookup("Title").is_none());
    }

    #[test]
    fn test_recursive_type_terminates() {
        let src = read("package ui\n\ntype Node struct {\n\tNext *Node\n}\n");
        let SymbolKind::TypeName(node) = &src.scope.lookup("Node").unwrap().kind else {
            panic!("expected type");
        };
        let fields = node.underlying.struct_fields().unwrap();
        assert_eq!(fields[0].ty.to_string(), "*ui.Node");
    }

    #[test]
    fn test_var_initializers() {
        let src = read(
            "package ui\n\ntype Card struct{}\n\nfunc New() *Card { return nil }\n\nvar (\n\tcard = &Card{}\n\tplain = Card{}\n\tmade = New()\n\tname = \"x\"\n\tcopy = card\n\tunknown = compute() + 1\n)\n",
        );
        let ty = |n: &str| match &src.scope.lookup(n).unwrap().kind {
            SymbolKind::Var(ty) => ty.to_string(),
            other => panic!("{:?}", other),
        };
        assert_eq!(ty("card"), "*ui.Card");
        assert_eq!(ty("plain"), "ui.Card");
        assert_eq!(ty("made"), "*ui.Card");
        assert_eq!(ty("name"), "string");
        assert_eq!(ty("copy"), "*ui.Card");
        assert_eq!(ty("unknown"), "invalid type");
    }

    #[test]
    fn test_const_group_repeats_previous_spec() {
        let src = read("package ui\n\ntype Size int\n\nconst (\n\tSmall Size = iota\n\tLarge\n)\n");
        match &src.scope.lookup("Large").unwrap().kind {
            SymbolKind::Const(ty) => assert_eq!(ty.to_string(), "ui.Size"),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_qualified_types_use_imports() {
        let mut io = PackageScope::new();
        io.insert(
            "Writer",
            SymbolKind::TypeName(Rc::new(NamedType {
                package: Some(PackageRef {
                    path: "io".into(),
                    name: "io".into(),
                }),
                name: "Writer".into(),
                underlying: Type::Interface(vec![]),
                methods: vec![],
            })),
        );
        let io = Rc::new(io);
        let imports = move |path: &str| (path == "io").then(|| io.clone());
        let src = read_with("package ui\n\nimport \"io\"\n\nfunc Write(w io.Writer) {}\n", &imports);
        assert!(src.diagnostics.is_empty(), "{:?}", src.diagnostics);
        let SymbolKind::Func(sig) = &src.scope.lookup("Write").unwrap().kind else {
            panic!("expected func");
        };
        assert_eq!(sig.params[0].ty.to_string(), "io.Writer");
    }

    #[test]
    fn test_unused_and_missing_imports_are_reported() {
        let mut fmt = PackageScope::new();
        fmt.insert("Sprint", SymbolKind::Func(Signature::default()));
        let fmt = Rc::new(fmt);
        let imports = move |path: &str| (path == "fmt").then(|| fmt.clone());
        let src = read_with(
            "package ui\n\nimport (\n\t\"fmt\"\n\t\"example.com/missing\"\n)\n",
            &imports,
        );
        let msgs = messages(&src);
        assert!(msgs.contains(&"\"fmt\" imported and not used".to_string()), "{:?}", msgs);
        assert!(msgs.iter().any(|m| m.starts_with("could not import example.com/missing")));
        let first = &src.diagnostics[0];
        assert_eq!(first.file.as_deref(), Some(Path::new("ui/types.go")));
        assert_eq!(first.position.map(|p| p.line), Some(4));
    }

    #[test]
    fn test_undefined_names_are_diagnosed() {
        let src = read("package ui\n\nfunc Show(c Missing) {}\n");
        assert_eq!(messages(&src), vec!["undefined: Missing".to_string()]);
        let SymbolKind::Func(sig) = &src.scope.lookup("Show").unwrap().kind else {
            panic!("expected func");
        };
        assert!(sig.params[0].ty.is_invalid());
    }

    #[test]
    fn test_interface_with_embedding() {
        let src = read(
            "package ui\n\ntype Namer interface {\n\tName() string\n}\n\ntype Widget interface {\n\tNamer\n\tRender() error\n}\n",
        );
        let SymbolKind::TypeName(w) = &src.scope.lookup("Widget").unwrap().kind else {
            panic!("expected type");
        };
        let Type::Interface(methods) = &w.underlying else {
            panic!("expected interface");
        };
        let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Render"]);
    }

    #[test]
    fn test_generic_type_declaration() {
        let src = read("package ui\n\ntype KeyValue[K comparable, V any] struct {\n\tKey K\n\tValue V\n}\n");
        let SymbolKind::TypeName(kv) = &src.scope.lookup("KeyValue").unwrap().kind else {
            panic!("expected type");
        };
        let fields = kv.underlying.struct_fields().unwrap();
        assert_eq!(fields[0].ty, Type::TypeParam("K".into()));
    }

    #[test]
    fn test_syntax_errors_are_positioned() {
        let src = read("package ui\n\nfunc Broken(a int) string string {}\n\nx := 1\n");
        let msgs = messages(&src);
        assert!(msgs.iter().any(|m| m.starts_with("syntax error")), "{:?}", msgs);
        assert!(msgs.contains(&"syntax error: non-declaration statement outside function body".to_string()));
    }

    #[test]
    fn test_redeclaration_keeps_first() {
        let src = read("package ui\n\nvar X = 1\nvar X = \"s\"\n");
        assert_eq!(messages(&src), vec!["X redeclared in this block".to_string()]);
        match &src.scope.lookup("X").unwrap().kind {
            SymbolKind::Var(ty) => assert_eq!(ty.to_string(), "int"),
            other => panic!("{:?}", other),
        }
    }
}
