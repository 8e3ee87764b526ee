//! Runtime support for generated renderers: output sinks, escapers,
//! formatters, the ambient context, and the dispatch registry.
//!
//! Generated code references this module by path, so the important names
//! are re-exported flat.

pub mod context;
pub mod error;
pub mod escape;
pub mod format;
pub mod inline;
pub mod output;
pub mod registry;
pub mod renderer;

pub use crate::config::Charset;
pub use context::{ContextNode, ContextValue, EmptyContext, MapContext};
pub use error::{BrokenRenderer, RenderError};
pub use escape::{Escaper, HtmlEscaper, PlainEscaper};
pub use format::{DefaultFormatter, Formatter};
pub use inline::render_inline;
pub use output::{EncodedBuffer, EncodedOutput, EncodedWriter, FmtOutput, IoOutput, Output};
pub use registry::{Registry, RegistryEntry};
pub use renderer::Renderer;
