//! Runtime contract errors of generated renderers.

use thiserror::Error;

use crate::config::Charset;

/// Failure modes of the byte-sink `write` path. Text-sink rendering only
/// ever fails with the sink's own error type.
#[derive(Debug, Error)]
pub enum RenderError<E: std::error::Error> {
    /// The sink's declared charset disagrees with the charset the template
    /// was compiled in. Checked before any byte is written.
    #[error("template charset {template} does not match output charset {output}")]
    UnsupportedCharset { template: Charset, output: Charset },

    /// The sink failed; passed through unmodified.
    #[error(transparent)]
    Sink(E),
}

/// The runtime dispatcher could not produce output for a model.
#[derive(Debug, Error)]
pub enum BrokenRenderer {
    #[error("no registered renderer supports the supplied model type")]
    NoRenderer,

    #[error("renderer `{name}` cannot process the supplied model")]
    ModelMismatch { name: &'static str },
}
