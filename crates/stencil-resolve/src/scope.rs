// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lexical scopes inside template bodies.
//!
//! A call like `@item.Render` inside `for _, item := range items` refers to
//! a loop variable, not an import or a package variable. The scope records
//! the names a template body can see and, where the declaration spells it
//! out, their type text.

use indexmap::IndexMap;
use stencil_ast::{CallNode, Node, RangeClause, TemplateDef};

use crate::host::lexer::{tokenize_prefix, Token, TokenKind};
use crate::host::{parse_header, parse_receiver, parse_type, Param, TypeExpr};

/// A name visible in a template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBinding {
    pub name: String,
    /// Declared type text, e.g. `*Card` or `ui.Item`. `None` when the type
    /// could only be known by inferring an expression.
    pub type_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalScope {
    bindings: IndexMap<String, LocalBinding>,
}

impl LexicalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope at the top of a template body: the receiver and the parameters.
    pub fn for_template(def: &TemplateDef) -> Self {
        let mut scope = Self::new();
        if let Some(recv) = def.receiver.as_deref().and_then(|r| parse_receiver(r).ok()) {
            scope.bind_param(&recv);
        }
        if let Ok(header) = parse_header(&def.signature) {
            for param in &header.params {
                scope.bind_param(param);
            }
        }
        scope
    }

    fn bind_param(&mut self, param: &Param) {
        if let Some(name) = &param.name {
            let ty = if param.variadic {
                TypeExpr::Slice(Box::new(param.ty.clone()))
            } else {
                param.ty.clone()
            };
            self.bind(name, Some(ty.to_string()));
        }
    }

    /// Bind `name`, shadowing any earlier binding. `_` binds nothing.
    pub fn bind(&mut self, name: &str, type_text: Option<String>) {
        if name == "_" || name.is_empty() {
            return;
        }
        // Remove first so the newest binding iterates last.
        self.bindings.shift_remove(name);
        self.bindings.insert(
            name.to_string(),
            LocalBinding {
                name: name.to_string(),
                type_text,
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<&LocalBinding> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Type text of the elements produced by ranging over `expr`, as
    /// `(key, value)`. Known only when `expr` is a local whose declared type
    /// is a slice, array, map or string.
    fn range_types(&self, expr: &str) -> (Option<String>, Option<String>) {
        let Some(ty) = self
            .lookup(expr.trim())
            .and_then(|b| b.type_text.as_deref())
            .and_then(|t| parse_type(t).ok())
        else {
            return (None, None);
        };
        let ty = match ty {
            TypeExpr::Pointer(inner) if matches!(*inner, TypeExpr::Array { .. }) => *inner,
            other => other,
        };
        match ty {
            TypeExpr::Slice(elem) | TypeExpr::Array { elem, .. } => {
                (Some("int".to_string()), Some(elem.to_string()))
            }
            TypeExpr::Map { key, value } => (Some(key.to_string()), Some(value.to_string())),
            TypeExpr::Name {
                qualifier: None,
                ref name,
                ..
            } if name == "string" => (Some("int".to_string()), Some("rune".to_string())),
            _ => (None, None),
        }
    }

    fn bind_range(&mut self, clause: &RangeClause) {
        if !clause.define {
            return;
        }
        let (key_ty, value_ty) = self.range_types(&clause.expr);
        if let Some(key) = &clause.key {
            self.bind(key, key_ty);
        }
        if let Some(value) = &clause.value {
            self.bind(value, value_ty);
        }
    }
}

/// A component call together with the scope it appears in.
#[derive(Debug, Clone)]
pub struct ScopedCall<'a> {
    pub call: &'a CallNode,
    pub scope: LexicalScope,
}

/// Every component call in `def`'s body, depth-first in source order.
pub fn calls_in(def: &TemplateDef) -> Vec<ScopedCall<'_>> {
    let mut out = Vec::new();
    let scope = LexicalScope::for_template(def);
    walk(&def.body, &scope, &mut out);
    out
}

fn walk<'a>(nodes: &'a [Node], scope: &LexicalScope, out: &mut Vec<ScopedCall<'a>>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Element(el) => walk(&el.children, scope, out),
            Node::Call(call) => {
                out.push(ScopedCall {
                    call,
                    scope: scope.clone(),
                });
                walk(&call.children, scope, out);
            }
            Node::For(f) => {
                let mut inner = scope.clone();
                match f.clause.clone().or_else(|| parse_for_header(&f.header)) {
                    Some(clause) => inner.bind_range(&clause),
                    None => {
                        for name in init_names(&f.header, "for") {
                            inner.bind(&name, None);
                        }
                    }
                }
                walk(&f.body, &inner, out);
            }
            Node::If(i) => {
                let mut inner = scope.clone();
                let names = i
                    .bindings
                    .clone()
                    .unwrap_or_else(|| init_names(&i.header, "if"));
                for name in names {
                    inner.bind(&name, None);
                }
                walk(&i.then_body, &inner, out);
                walk(&i.else_body, &inner, out);
            }
        }
    }
}

fn header_tokens(header: &str, keyword: &str) -> Vec<Token> {
    let mut tokens = tokenize_prefix(header);
    if tokens.first().is_some_and(|t| t.text(header) == keyword) {
        tokens.remove(0);
    }
    tokens
}

/// Read a range clause from raw `for` header text. Used when the parser
/// could not produce a structured clause.
pub fn parse_for_header(header: &str) -> Option<RangeClause> {
    let tokens = header_tokens(header, "for");
    let range_at = tokens
        .iter()
        .position(|t| t.kind == TokenKind::Ident && t.text(header) == "range")?;
    let expr_start = tokens[range_at].span.end;
    let expr = header[expr_start..].trim().trim_end_matches('{').trim().to_string();

    let lhs = &tokens[..range_at];
    let (define, names) = match lhs.split_last() {
        None => (false, &lhs[..0]),
        Some((op, names)) if op.kind == TokenKind::Define => (true, names),
        Some((op, names)) if op.kind == TokenKind::Assign => (false, names),
        Some(_) => return None,
    };
    let mut idents = Vec::new();
    for (i, tok) in names.iter().enumerate() {
        let expect_ident = i % 2 == 0;
        match (expect_ident, tok.kind) {
            (true, TokenKind::Ident) => idents.push(tok.text(header).to_string()),
            (false, TokenKind::Comma) => {}
            _ => return None,
        }
    }
    if idents.len() > 2 {
        return None;
    }
    let mut idents = idents.into_iter();
    Some(RangeClause {
        key: idents.next(),
        value: idents.next(),
        define,
        expr,
    })
}

/// Names defined by the init statement of an `if` or a three-clause `for`,
/// e.g. `user, ok` in `if user, ok := lookup(id); ok`.
pub fn init_names(header: &str, keyword: &str) -> Vec<String> {
    let tokens = header_tokens(header, keyword);
    let mut names = Vec::new();
    for tok in &tokens {
        match tok.kind {
            TokenKind::Ident => names.push(tok.text(header).to_string()),
            TokenKind::Comma => {}
            TokenKind::Define => return names,
            _ => break,
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_ast::{ForNode, IfNode, Span, TemplateKind};

    fn call(reference: &str) -> Node {
        Node::Call(CallNode {
            reference: reference.into(),
            args: None,
            attributes: vec![],
            children: vec![],
            span: Span::default(),
        })
    }

    fn template(receiver: Option<&str>, signature: &str, body: Vec<Node>) -> TemplateDef {
        TemplateDef {
            kind: TemplateKind::Html,
            receiver: receiver.map(Into::into),
            signature: signature.into(),
            span: Span::default(),
            body,
        }
    }

    #[test]
    fn test_params_and_receiver_are_bound() {
        let def = template(Some("p *Page"), "Show(title string, items ...ui.Item)", vec![]);
        let scope = LexicalScope::for_template(&def);
        assert_eq!(scope.lookup("p").unwrap().type_text.as_deref(), Some("*Page"));
        assert_eq!(scope.lookup("title").unwrap().type_text.as_deref(), Some("string"));
        assert_eq!(scope.lookup("items").unwrap().type_text.as_deref(), Some("[]ui.Item"));
    }

    #[test]
    fn test_range_clause_types_from_declared_slice() {
        let body = vec![Node::For(ForNode {
            clause: None,
            header: "for i, item := range items".into(),
            body: vec![call("item.View")],
            span: Span::default(),
        })];
        let def = template(None, "List(items []*ui.Item)", body);
        let calls = calls_in(&def);
        assert_eq!(calls.len(), 1);
        let scope = &calls[0].scope;
        assert_eq!(scope.lookup("i").unwrap().type_text.as_deref(), Some("int"));
        assert_eq!(scope.lookup("item").unwrap().type_text.as_deref(), Some("*ui.Item"));
    }

    #[test]
    fn test_structured_clause_wins_over_header_text() {
        let body = vec![Node::For(ForNode {
            clause: Some(RangeClause {
                key: Some("k".into()),
                value: Some("v".into()),
                define: true,
                expr: "byName".into(),
            }),
            header: "for garbage".into(),
            body: vec![call("v.View")],
            span: Span::default(),
        })];
        let def = template(None, "Map(byName map[string]Card)", body);
        let calls = calls_in(&def);
        let scope = &calls[0].scope;
        assert_eq!(scope.lookup("k").unwrap().type_text.as_deref(), Some("string"));
        assert_eq!(scope.lookup("v").unwrap().type_text.as_deref(), Some("Card"));
    }

    #[test]
    fn test_if_bindings_cover_both_branches_only() {
        let body = vec![
            Node::If(IfNode {
                bindings: None,
                header: "if user, ok := lookup(id); ok".into(),
                then_body: vec![call("user.Badge")],
                else_body: vec![call("Fallback")],
                span: Span::default(),
            }),
            call("After"),
        ];
        let def = template(None, "Page(id string)", body);
        let calls = calls_in(&def);
        assert_eq!(calls.len(), 3);
        assert!(calls[0].scope.contains("user"));
        assert!(calls[0].scope.lookup("user").unwrap().type_text.is_none());
        assert!(calls[1].scope.contains("ok"));
        assert!(!calls[2].scope.contains("user"));
    }

    #[test]
    fn test_parse_for_header_forms() {
        let c = parse_for_header("for _, v := range xs {").unwrap();
        assert_eq!(c.key.as_deref(), Some("_"));
        assert_eq!(c.value.as_deref(), Some("v"));
        assert!(c.define);
        assert_eq!(c.expr, "xs");

        let c = parse_for_header("for range ticks").unwrap();
        assert_eq!(c.key, None);
        assert!(!c.define);

        assert!(parse_for_header("for i := 0; i < n; i++").is_none());
        assert!(parse_for_header("for a, b, c := range xs").is_none());
        assert_eq!(init_names("for i := 0; i < n; i++", "for"), vec!["i"]);
        assert!(init_names("if ok", "if").is_empty());
    }

    #[test]
    fn test_blank_is_never_bound() {
        let mut scope = LexicalScope::new();
        scope.bind("_", None);
        assert!(scope.is_empty());
    }
}
