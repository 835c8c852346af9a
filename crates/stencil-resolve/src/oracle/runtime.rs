// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Source model of the template runtime and the standard packages its
//! render contract mentions.

use crate::config::ResolverConfig;

/// One package's source, ready to register with an oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageText {
    pub path: String,
    pub name: String,
    pub file_name: String,
    pub text: String,
}

/// The runtime package named by `config`, plus the context and writer
/// packages of its render method.
pub fn runtime_sources(config: &ResolverConfig) -> Vec<PackageText> {
    let ctx_name = last_segment(&config.context_package);
    let io_name = last_segment(&config.writer_package);
    let runtime = format!(
        r#"package {rt}

import (
	"{ctx_pkg}"
	"{io_pkg}"
)

type {component} interface {{
	{render}(ctx {ctx}.{ctx_ty}, w {io}.{io_ty}) error
}}

type ComponentFunc func(ctx {ctx}.{ctx_ty}, w {io}.{io_ty}) error

func (f ComponentFunc) {render}(ctx {ctx}.{ctx_ty}, w {io}.{io_ty}) error {{
	return f(ctx, w)
}}

var {nop} {component}

type KeyValue[K comparable, V any] struct {{
	Key   K
	Value V
}}

type {attributes} map[string]any

func (a {attributes}) {items}() []KeyValue[string, any] {{
	return nil
}}

type SafeCSS string

type {css_class} interface {{
	ClassName() string
}}

type ComponentCSSClass struct {{
	ID    string
	Class SafeCSS
}}

func (css ComponentCSSClass) ClassName() string {{
	return css.ID
}}

type {script} struct {{
	Name       string
	Function   string
	Call       string
	CallInline string
}}

func Raw(html string, errs ...error) {component} {{
	return {nop}
}}
"#,
        rt = config.runtime_name,
        ctx_pkg = config.context_package,
        io_pkg = config.writer_package,
        ctx = ctx_name,
        ctx_ty = config.context_type,
        io = io_name,
        io_ty = config.writer_type,
        component = config.component_type,
        render = config.render_method,
        nop = config.nop_component,
        attributes = config.attributes_type,
        items = config.attributer_method,
        css_class = config.css_class_type,
        script = config.script_type,
    );

    let context = format!(
        "package {name}\n\ntype {ty} interface {{\n\tDone() <-chan struct{{}}\n\tErr() error\n\tValue(key any) any\n}}\n\nfunc Background() {ty} {{\n\treturn nil\n}}\n",
        name = ctx_name,
        ty = config.context_type,
    );
    let writer = format!(
        "package {name}\n\ntype {ty} interface {{\n\tWrite(p []byte) (n int, err error)\n}}\n",
        name = io_name,
        ty = config.writer_type,
    );

    vec![
        PackageText {
            path: config.context_package.clone(),
            name: ctx_name.to_string(),
            file_name: format!("{}.go", ctx_name),
            text: context,
        },
        PackageText {
            path: config.writer_package.clone(),
            name: io_name.to_string(),
            file_name: format!("{}.go", io_name),
            text: writer,
        },
        PackageText {
            path: config.runtime_package.clone(),
            name: config.runtime_name.clone(),
            file_name: "runtime.go".to_string(),
            text: runtime,
        },
    ]
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
