//! The contract every generated renderer implements.

use std::any::TypeId;

use crate::config::Charset;
use crate::runtime::context::{ContextNode, EmptyContext};
use crate::runtime::error::RenderError;
use crate::runtime::output::{EncodedOutput, Output};

/// A compiled template married to its model type. Generated code implements
/// only `execute_with` and `encode_with`; the entry points, the charset
/// contract, and type dispatch come from the defaults.
pub trait Renderer {
    type Model: 'static;

    /// The charset the template source was compiled in. Byte sinks must
    /// declare the same charset or `write` refuses to run.
    const TEMPLATE_CHARSET: Charset;

    /// Renders to a text sink with an explicit ambient context.
    fn execute_with<O, C>(model: &Self::Model, out: &mut O, ctx: &C) -> Result<(), O::Error>
    where
        O: Output + ?Sized,
        C: ContextNode + ?Sized;

    /// Renders to a byte sink, assuming the charset was already checked.
    fn encode_with<O, C>(model: &Self::Model, out: &mut O, ctx: &C) -> Result<(), O::Error>
    where
        O: EncodedOutput + ?Sized,
        C: ContextNode + ?Sized;

    fn execute<O>(model: &Self::Model, out: &mut O) -> Result<(), O::Error>
    where
        O: Output + ?Sized,
    {
        Self::execute_with(model, out, &EmptyContext)
    }

    fn write_with<O, C>(model: &Self::Model, out: &mut O, ctx: &C) -> Result<(), RenderError<O::Error>>
    where
        O: EncodedOutput + ?Sized,
        O::Error: std::error::Error,
        C: ContextNode + ?Sized,
    {
        if out.charset() != Self::TEMPLATE_CHARSET {
            return Err(RenderError::UnsupportedCharset {
                template: Self::TEMPLATE_CHARSET,
                output: out.charset(),
            });
        }
        Self::encode_with(model, out, ctx).map_err(RenderError::Sink)
    }

    fn write<O>(model: &Self::Model, out: &mut O) -> Result<(), RenderError<O::Error>>
    where
        O: EncodedOutput + ?Sized,
        O::Error: std::error::Error,
    {
        Self::write_with(model, out, &EmptyContext)
    }

    /// Whether this renderer can handle values of the given model type;
    /// used by runtime dispatchers.
    fn supports_type(model: TypeId) -> bool {
        model == TypeId::of::<Self::Model>()
    }
}
