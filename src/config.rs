//! The template declaration surface: everything a model may configure about
//! its template, mirrored from the annotation options of the source system.
//!
//! `":auto"` / `":default"` sentinels are kept as spelled so a manifest can
//! round-trip them; resolution to concrete values happens in the accessors.

use std::fmt;

use serde::Deserialize;

/// Sentinel for "resolve automatically".
pub const AUTO: &str = ":auto";
/// Sentinel for "use the host default".
pub const DEFAULT: &str = ":default";

/// Per-model template options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Resource path of the template; empty means not set.
    pub path: String,
    /// Inline template literal; empty means not set.
    pub template: String,
    /// Name of the generated renderer; `":auto"` derives `<Model>Renderer`.
    pub adapter_name: String,
    /// Escaper selection; `Auto` resolves to HTML.
    pub content_type: ContentType,
    /// Formatter selection; `Auto` resolves to the default formatter.
    pub formatter: FormatterChoice,
    /// Template source encoding; `":default"` resolves to UTF-8.
    pub charset: String,
    /// Partial-name remappings, tried before path resolution.
    pub partials: Vec<PartialMapping>,
    /// Ordered prefix-rewrite rules applied to template and partial paths.
    pub path_mapping: Vec<PathMapping>,
    /// Marker traits the generated renderer must implement.
    pub interfaces: InterfaceRequirements,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            template: String::new(),
            adapter_name: AUTO.to_string(),
            content_type: ContentType::Auto,
            formatter: FormatterChoice::Auto,
            charset: DEFAULT.to_string(),
            partials: Vec::new(),
            path_mapping: Vec::new(),
            interfaces: InterfaceRequirements::default(),
        }
    }
}

impl TemplateConfig {
    /// Renderer name for a model, applying the `":auto"` rule.
    pub fn adapter_name_for(&self, model_simple_name: &str) -> String {
        if self.adapter_name == AUTO || self.adapter_name.is_empty() {
            format!("{model_simple_name}Renderer")
        } else {
            self.adapter_name.clone()
        }
    }

    /// Concrete charset, or `None` if the configured name is unknown.
    pub fn resolved_charset(&self) -> Option<Charset> {
        if self.charset == DEFAULT || self.charset.is_empty() {
            return Some(Charset::Utf8);
        }
        Charset::parse(&self.charset)
    }

    /// Applies the ordered path-mapping rules; first matching prefix wins.
    pub fn remap_path(&self, path: &str) -> String {
        for rule in &self.path_mapping {
            if let Some(rest) = path.strip_prefix(&rule.prefix) {
                return format!("{}{}", rule.replacement, rest);
            }
        }
        path.to_string()
    }

    /// Finds a partial remapping by name.
    pub fn partial(&self, name: &str) -> Option<&PartialMapping> {
        self.partials.iter().find(|p| p.name == name)
    }
}

/// Remaps one partial name to an inline template or an alternate path.
/// At most one of `template`/`path` should be non-empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialMapping {
    pub name: String,
    pub template: String,
    pub path: String,
}

/// One prefix-rewrite rule for template/partial paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathMapping {
    pub prefix: String,
    pub replacement: String,
}

/// Escaper/content-type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Auto,
    Html,
    Plain,
}

impl ContentType {
    /// The `Auto` resolution rule: HTML unless told otherwise.
    pub fn resolve(self) -> ContentType {
        match self {
            ContentType::Auto => ContentType::Html,
            other => other,
        }
    }
}

/// Formatter selection. `Custom` names a type path implementing the runtime
/// `Formatter` trait.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterChoice {
    #[default]
    Auto,
    #[serde(untagged)]
    Custom(String),
}

/// Trait paths the generated artifacts must implement. Renderer entries are
/// emitted as empty marker `impl` blocks; model entries are checked against
/// the capabilities recorded on the model's descriptor, and an unmet
/// requirement is reported at warning severity (the discovery facility that
/// builds the catalog stays authoritative for actual trait impls).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterfaceRequirements {
    pub renderer_implements: Vec<String>,
    pub model_implements: Vec<String>,
}

/// Template source encodings the compiler can decode and pre-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
}

impl Charset {
    pub fn parse(name: &str) -> Option<Charset> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Some(Charset::Latin1),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_adapter_name_appends_renderer() {
        let config = TemplateConfig::default();
        assert_eq!(config.adapter_name_for("HelloWorld"), "HelloWorldRenderer");

        let named = TemplateConfig {
            adapter_name: "Hello".to_string(),
            ..TemplateConfig::default()
        };
        assert_eq!(named.adapter_name_for("HelloWorld"), "Hello");
    }

    #[test]
    fn default_charset_is_utf8() {
        let config = TemplateConfig::default();
        assert_eq!(config.resolved_charset(), Some(Charset::Utf8));
    }

    #[test]
    fn charset_names_are_case_insensitive() {
        assert_eq!(Charset::parse("utf-8"), Some(Charset::Utf8));
        assert_eq!(Charset::parse("UTF-8"), Some(Charset::Utf8));
        assert_eq!(Charset::parse("ISO-8859-1"), Some(Charset::Latin1));
        assert_eq!(Charset::parse("ebcdic"), None);
    }

    #[test]
    fn path_mapping_first_match_wins() {
        let config = TemplateConfig {
            path_mapping: vec![
                PathMapping {
                    prefix: "views/".to_string(),
                    replacement: "templates/".to_string(),
                },
                PathMapping {
                    prefix: "views/admin/".to_string(),
                    replacement: "never/".to_string(),
                },
            ],
            ..TemplateConfig::default()
        };
        assert_eq!(config.remap_path("views/admin/x.mustache"), "templates/admin/x.mustache");
        assert_eq!(config.remap_path("other/x.mustache"), "other/x.mustache");
    }

    #[test]
    fn content_type_auto_resolves_to_html() {
        assert_eq!(ContentType::Auto.resolve(), ContentType::Html);
        assert_eq!(ContentType::Plain.resolve(), ContentType::Plain);
    }
}
