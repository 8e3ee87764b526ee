//! The template-to-code compiler.
//!
//! ## Architecture
//!
//! ```text
//! template source -> Lexer -> Tokens -> Parser -> AST
//!     -> Loader (partials/parents inlined) -> Resolver -> IR
//!     -> Codegen -> Rust renderer source
//! ```
//!
//! [`compile_model`] runs the pipeline for one model; the batch driver sits
//! on top of it.

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod ir;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod resolve;

use codegen::{Codegen, CodegenConfig};
use diagnostics::CompileError;
use loader::{ResourceLoader, TemplateLoader};

use crate::config::{FormatterChoice, TemplateConfig};
use crate::descriptor::TypeRef;

/// One annotated model handed to the compiler by the discovery facility.
#[derive(Debug, Clone)]
pub struct ModelUnit {
    /// Rust path of the model type; also the catalog key.
    pub type_name: String,
    pub config: TemplateConfig,
    /// Where the model was declared, for diagnostics.
    pub declared_at: String,
}

impl ModelUnit {
    /// The type name without its module path.
    pub fn simple_name(&self) -> &str {
        self.type_name.rsplit("::").next().unwrap_or(&self.type_name)
    }
}

/// The artifact of one successful compilation.
#[derive(Debug)]
pub struct GeneratedRenderer {
    pub renderer_name: String,
    /// File the driver writes, `<RendererName>.rs`.
    pub file_name: String,
    /// Formatted Rust source.
    pub source: String,
    /// Where the template text came from, for logging.
    pub template_source: String,
    /// Non-fatal findings, reported by the driver at warning severity.
    pub warnings: Vec<String>,
}

/// Compiles one model: load -> parse -> inline -> resolve -> emit.
pub fn compile_model(
    unit: &ModelUnit,
    model: TypeRef,
    resources: &dyn ResourceLoader,
) -> Result<GeneratedRenderer, CompileError> {
    let simple = unit.simple_name();
    let template = TemplateLoader::new(resources, &unit.config).load_for_model(simple)?;

    let mut warnings: Vec<String> = unit
        .config
        .partials
        .iter()
        .filter(|mapping| !template.partials.contains(&mapping.name))
        .map(|mapping| format!("partial mapping `{}` is never referenced by the template", mapping.name))
        .collect();
    // Model-side interface requirements are checked against the capabilities
    // recorded on the descriptor; the discovery facility that built the
    // catalog stays authoritative, so unmet requirements do not abort.
    for interface in &unit.config.interfaces.model_implements {
        if !model.implements(interface) {
            warnings.push(format!(
                "model `{}` does not declare required interface `{interface}`",
                unit.type_name
            ));
        }
    }

    let ir = resolve::resolve(&template.root, model)?;

    let renderer_name = unit.config.adapter_name_for(simple);
    let mut config = CodegenConfig::new(&renderer_name, &unit.type_name);
    config.charset = template.charset;
    config.content_type = unit.config.content_type.resolve();
    config.formatter = match &unit.config.formatter {
        FormatterChoice::Auto => None,
        FormatterChoice::Custom(path) => Some(path.clone()),
    };
    config.renderer_interfaces = unit.config.interfaces.renderer_implements.clone();

    let source = Codegen::new(config).generate_file(&ir)?;
    Ok(GeneratedRenderer {
        file_name: format!("{renderer_name}.rs"),
        renderer_name,
        source,
        template_source: template.source_name,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::loader::MemoryLoader;
    use crate::descriptor::TypeDescriptor;

    #[test]
    fn pipeline_produces_a_named_renderer_file() {
        let model = TypeDescriptor::record("HelloWorld")
            .field("message", TypeDescriptor::text())
            .build();
        let unit = ModelUnit {
            type_name: "HelloWorld".to_string(),
            config: TemplateConfig {
                template: "Hello {{message}}!".to_string(),
                ..TemplateConfig::default()
            },
            declared_at: "tests".to_string(),
        };
        let generated = compile_model(&unit, model, &MemoryLoader::new()).expect("compile");
        assert_eq!(generated.renderer_name, "HelloWorldRenderer");
        assert_eq!(generated.file_name, "HelloWorldRenderer.rs");
        assert!(generated.source.contains("pub struct HelloWorldRenderer;"));
        assert!(generated.source.contains(r#"out.write_str("Hello ")?;"#));
    }

    #[test]
    fn unmet_model_interface_requirement_is_warned() {
        let support = TypeDescriptor::record("clock::Timestamped")
            .method("at", TypeDescriptor::text())
            .build();
        let model = TypeDescriptor::record("Hello")
            .field("message", TypeDescriptor::text())
            .capability(&support)
            .build();
        let unit = ModelUnit {
            type_name: "Hello".to_string(),
            config: TemplateConfig {
                template: "{{message}}".to_string(),
                interfaces: crate::config::InterfaceRequirements {
                    renderer_implements: Vec::new(),
                    model_implements: vec![
                        "clock::Timestamped".to_string(),
                        "audit::Redactable".to_string(),
                    ],
                },
                ..TemplateConfig::default()
            },
            declared_at: "tests".to_string(),
        };
        let generated = compile_model(&unit, model, &MemoryLoader::new()).expect("compile");
        assert_eq!(generated.warnings.len(), 1, "only the missing capability is reported");
        assert!(generated.warnings[0].contains("audit::Redactable"));
    }

    #[test]
    fn simple_name_strips_the_module_path() {
        let unit = ModelUnit {
            type_name: "crate::views::Index".to_string(),
            config: TemplateConfig::default(),
            declared_at: String::new(),
        };
        assert_eq!(unit.simple_name(), "Index");
    }
}
