//! A thin renderer registry for runtime dispatch.
//!
//! Generated renderers are static: each knows exactly one model type. The
//! registry lets callers hold a set of them and render a model they only
//! have as `&dyn Any`, which is what a web framework integration needs.
//! Configuration is plain values; there is no global service loading.

use std::any::{Any, TypeId};
use std::convert::Infallible;

use crate::runtime::error::BrokenRenderer;

type ErasedRender = Box<dyn Fn(&dyn Any, &mut String) -> Result<(), BrokenRenderer> + Send + Sync>;

/// One registered renderer: its name, the model type it supports, and a
/// type-erased render function.
pub struct RegistryEntry {
    name: &'static str,
    model: TypeId,
    render: ErasedRender,
}

impl RegistryEntry {
    pub fn new<M: 'static>(
        name: &'static str,
        render: fn(&M, &mut String) -> Result<(), Infallible>,
    ) -> Self {
        Self {
            name,
            model: TypeId::of::<M>(),
            render: Box::new(move |model, out| {
                let model = model
                    .downcast_ref::<M>()
                    .ok_or(BrokenRenderer::ModelMismatch { name })?;
                render(model, out).map_err(|e| match e {})
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn supports_type(&self, model: TypeId) -> bool {
        self.model == model
    }
}

#[derive(Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: RegistryEntry) {
        self.entries.push(entry);
    }

    pub fn supports_type(&self, model: TypeId) -> bool {
        self.entries.iter().any(|e| e.supports_type(model))
    }

    /// Renders a model through the first entry that supports its type.
    pub fn render(&self, model: &dyn Any) -> Result<String, BrokenRenderer> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.supports_type(model.type_id()))
            .ok_or(BrokenRenderer::NoRenderer)?;
        let mut out = String::new();
        (entry.render)(model, &mut out)?;
        Ok(out)
    }
}
