// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Resolver configuration.
//!
//! Names the runtime package and the marker types the resolver recognizes.
//! Everything has a default matching the stock runtime; a project can
//! override fields from a TOML table.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Import path of the template runtime package.
    pub runtime_package: String,
    /// Package name the runtime is imported under when no alias is given.
    pub runtime_name: String,
    /// Renderable marker type returned by function components.
    pub component_type: String,
    /// Value returned by synthesized stubs.
    pub nop_component: String,
    /// Attribute-bag type.
    pub attributes_type: String,
    /// Method name of the attribute-provider capability.
    pub attributer_method: String,
    /// Return type of CSS-style stubs, and the value they return.
    pub css_class_type: String,
    pub css_class_value: String,
    /// Return type of script-style stubs; the stub returns its zero value.
    pub script_type: String,
    /// Name of the render method a struct component must implement.
    pub render_method: String,
    /// Package path and type name of the render method's first parameter.
    pub context_package: String,
    pub context_type: String,
    /// Package path and type name of the render method's second parameter.
    pub writer_package: String,
    pub writer_type: String,
    /// Template file extension, without the dot.
    pub template_extension: String,
    /// Suffix replacing `.<ext>` to form a stand-in file name.
    pub overlay_suffix: String,
    /// Treat an unresolved parameter named `attrs` as an attribute bag.
    pub attrs_name_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            runtime_package: "github.com/a-h/templ".to_string(),
            runtime_name: "templ".to_string(),
            component_type: "Component".to_string(),
            nop_component: "NopComponent".to_string(),
            attributes_type: "Attributes".to_string(),
            attributer_method: "Items".to_string(),
            css_class_type: "CSSClass".to_string(),
            css_class_value: "ComponentCSSClass{}".to_string(),
            script_type: "ComponentScript".to_string(),
            render_method: "Render".to_string(),
            context_package: "context".to_string(),
            context_type: "Context".to_string(),
            writer_package: "io".to_string(),
            writer_type: "Writer".to_string(),
            template_extension: "templ".to_string(),
            overlay_suffix: "_templ.go".to_string(),
            attrs_name_fallback: true,
        }
    }
}

impl ResolverConfig {
    /// Parse a config from TOML; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// `true` if `path`/`name` is the runtime's component marker type.
    pub fn is_component_marker(&self, package: &str, name: &str) -> bool {
        package == self.runtime_package && name == self.component_type
    }

    /// `true` if `path`/`name` is the runtime's attribute-bag type.
    pub fn is_attributes_type(&self, package: &str, name: &str) -> bool {
        package == self.runtime_package && name == self.attributes_type
    }
}
