// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Reading host-language source fragments.

pub mod header;
pub mod imports;
pub mod lexer;

pub use header::{parse_header, parse_receiver, parse_type, FuncHeader, HeaderError, Param, TypeExpr};
pub use imports::{file_imports, find_alias, implicit_name, parse_imports, ImportDecl, ImportSpec};
