//! stacheforge: a type-checked, ahead-of-time Mustache compiler.
//!
//! Given a catalog of type descriptors (the statically known structure of
//! your models) and Mustache templates, stacheforge emits Rust source for
//! renderers: unit structs that write a fully rendered template for a model
//! into an output sink, with escaping and formatting applied. Name
//! resolution, type checking of every interpolation, and partial/parent
//! inlining all happen at generation time; rendering is straight-line
//! writes.
//!
//! ## Pipeline
//!
//! ```text
//! template -> lexer -> parser -> loader -> resolver -> codegen -> .rs file
//! ```
//!
//! - [`compiler`] is the template-to-code pipeline.
//! - [`descriptor`] describes model types to the resolver.
//! - [`config`] is the per-model template declaration surface.
//! - [`manifest`] loads both from a TOML file.
//! - [`driver`] batches compilations and collects diagnostics.
//! - [`runtime`] is what generated code links against: output sinks,
//!   escapers, formatters, the ambient `@context` tree, and a dispatch
//!   registry.
//!
//! ## Example
//!
//! ```
//! use stacheforge::compiler::{ModelUnit, compile_model};
//! use stacheforge::compiler::loader::MemoryLoader;
//! use stacheforge::config::TemplateConfig;
//! use stacheforge::descriptor::TypeDescriptor;
//!
//! let model = TypeDescriptor::record("Greeting")
//!     .field("name", TypeDescriptor::text())
//!     .build();
//! let unit = ModelUnit {
//!     type_name: "Greeting".to_string(),
//!     config: TemplateConfig {
//!         template: "Hello {{name}}!".to_string(),
//!         ..TemplateConfig::default()
//!     },
//!     declared_at: "doc".to_string(),
//! };
//! let artifact = compile_model(&unit, model, &MemoryLoader::new()).unwrap();
//! assert!(artifact.source.contains("pub struct GreetingRenderer;"));
//! ```

pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod driver;
pub mod manifest;
pub mod runtime;

pub use compiler::diagnostics::{CompileError, Diagnostic, Severity, Span};
pub use compiler::{GeneratedRenderer, ModelUnit, compile_model};
pub use config::{Charset, ContentType, TemplateConfig};
pub use descriptor::{DescriptorCatalog, TypeDescriptor};
pub use driver::{BatchReport, Driver};
