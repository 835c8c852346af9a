// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Component resolution for stencil templates.
//!
//! Templates call components declared in host-language packages, in other
//! template packages, or on package-level variables. This crate finds the
//! declaration each call refers to and describes how to call it. Template
//! files are made visible to the type oracle through synthesized stand-in
//! files registered as an overlay.

pub mod cache;
pub mod config;
mod error;
pub mod graph;
pub mod host;
pub mod layout;
pub mod oracle;
pub mod overlay;
pub mod predicates;
mod resolver;
pub mod scan;
pub mod scope;
mod signature;
pub mod synth;
pub mod types;

pub use cache::{LoadScope, PackageCache};
pub use config::ResolverConfig;
pub use error::{ContractViolation, ResolveError, ResolveErrorKind};
pub use graph::{DependencyGraph, PackageNode};
pub use layout::ModuleLayout;
pub use oracle::{LoadRequest, LoadTarget, LoadedPackage, MemoryOracle, OracleDiagnostic, OracleError, TypeOracle};
pub use overlay::Overlay;
pub use predicates::{PredicateAnalyzer, TypePredicates};
pub use resolver::{CallResolution, ComponentResolver};
pub use scan::find_template_files;
pub use scope::{LexicalScope, LocalBinding};
pub use signature::{ComponentKind, ComponentSignature, ParameterDescriptor};
pub use synth::synthesize;
