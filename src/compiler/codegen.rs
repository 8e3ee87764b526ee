//! Code generation: resolved IR to Rust renderer source.
//!
//! The emitter lowers the IR into straight-line writes against the runtime
//! `Output` abstraction. The same body is generated twice: once for the text
//! path (`execute_with`) and once for the encoded path (`encode_with`),
//! where literals are pre-encoded into byte constants in the template
//! charset. Everything dynamic goes through the configured formatter and,
//! for escaped interpolations, the configured escaper.

use proc_macro2::{Ident, Literal, TokenStream};
use quote::{format_ident, quote};

use crate::compiler::diagnostics::CompileError;
use crate::compiler::ir::{IrNode, IterMeta, ResolvedExpr, ScopeEntry, Step};
use crate::config::{Charset, ContentType};
use crate::descriptor::{LambdaArg, LambdaShape, TypeShape};

/// Everything the emitter needs besides the IR itself.
#[derive(Debug, Clone)]
pub struct CodegenConfig {
    /// Name of the generated unit struct, e.g. `HelloWorldRenderer`.
    pub renderer_name: String,
    /// Rust path of the model type, e.g. `crate::HelloWorld`.
    pub model_type: String,
    pub charset: Charset,
    /// Resolved content type; `Auto` must not reach the emitter.
    pub content_type: ContentType,
    /// Path of a custom formatter type, or `None` for the default.
    pub formatter: Option<String>,
    /// Marker traits the renderer must implement.
    pub renderer_interfaces: Vec<String>,
    /// Path of the runtime crate, normally `::stacheforge`.
    pub runtime_crate: String,
}

impl CodegenConfig {
    pub fn new(renderer_name: impl Into<String>, model_type: impl Into<String>) -> Self {
        Self {
            renderer_name: renderer_name.into(),
            model_type: model_type.into(),
            charset: Charset::Utf8,
            content_type: ContentType::Html,
            formatter: None,
            renderer_interfaces: Vec::new(),
            runtime_crate: "::stacheforge".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitMode {
    /// Text sink: literals via `write_str`.
    Text,
    /// Byte sink: literals pre-encoded in the template charset.
    Encoded,
}

/// How a value chain evaluates: always, or only when a map lookup hits.
enum Chain {
    Plain(TokenStream),
    Optional(TokenStream),
}

/// Per-frame identifiers available to chain emission.
struct FrameVars {
    value: TokenStream,
    first: Ident,
    last: Ident,
    index: Ident,
}

pub struct Codegen {
    config: CodegenConfig,
    frames: Vec<FrameVars>,
    binding_seq: usize,
}

impl Codegen {
    pub fn new(config: CodegenConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
            binding_seq: 0,
        }
    }

    /// Generates the complete renderer source file as a token stream.
    pub fn generate(&mut self, ir: &[IrNode]) -> Result<TokenStream, CompileError> {
        let rt = self.runtime_path()?;
        let renderer: syn::Ident = syn::parse_str(&self.config.renderer_name).map_err(|_| {
            CompileError::io(format!(
                "adapter name `{}` is not a valid Rust identifier",
                self.config.renderer_name
            ))
        })?;
        let model: syn::Path = syn::parse_str(&self.config.model_type).map_err(|e| {
            CompileError::internal(format!(
                "model type `{}` is not a valid Rust path: {e}",
                self.config.model_type
            ))
        })?;

        self.frames.clear();
        self.frames.push(FrameVars {
            value: quote!(model),
            first: format_ident!("__first0"),
            last: format_ident!("__last0"),
            index: format_ident!("__idx0"),
        });

        let text_body = self.emit_nodes(ir, EmitMode::Text)?;
        self.frames.truncate(1);
        self.binding_seq = 0;
        let encoded_body = self.emit_nodes(ir, EmitMode::Encoded)?;

        let charset = match self.config.charset {
            Charset::Utf8 => quote!(#rt::Charset::Utf8),
            Charset::Latin1 => quote!(#rt::Charset::Latin1),
        };
        let renderer_string = &self.config.renderer_name;

        let markers = self
            .config
            .renderer_interfaces
            .iter()
            .map(|path| {
                let path: syn::Path = syn::parse_str(path).map_err(|e| {
                    CompileError::internal(format!("interface `{path}` is not a valid Rust path: {e}"))
                })?;
                Ok(quote! { impl #path for #renderer {} })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(quote! {
            use #rt::Renderer as _;

            pub struct #renderer;

            impl #rt::Renderer for #renderer {
                type Model = #model;

                const TEMPLATE_CHARSET: #rt::Charset = #charset;

                #[allow(unused_variables)]
                fn execute_with<O, C>(model: &#model, out: &mut O, ctx: &C) -> Result<(), O::Error>
                where
                    O: #rt::Output + ?Sized,
                    C: #rt::ContextNode + ?Sized,
                {
                    #(#text_body)*
                    Ok(())
                }

                #[allow(unused_variables)]
                fn encode_with<O, C>(model: &#model, out: &mut O, ctx: &C) -> Result<(), O::Error>
                where
                    O: #rt::EncodedOutput + ?Sized,
                    C: #rt::ContextNode + ?Sized,
                {
                    #(#encoded_body)*
                    Ok(())
                }
            }

            impl #renderer {
                /// Dispatch glue for the runtime registry.
                pub fn registry_entry() -> #rt::RegistryEntry {
                    #rt::RegistryEntry::new::<#model>(#renderer_string, |model, out| {
                        Self::execute(model, out)
                    })
                }
            }

            #(#markers)*
        })
    }

    /// Generates the renderer as formatted Rust source.
    pub fn generate_file(&mut self, ir: &[IrNode]) -> Result<String, CompileError> {
        let tokens = self.generate(ir)?;
        let file: syn::File = syn::parse2(tokens)
            .map_err(|e| CompileError::internal(format!("emitted code does not parse: {e}")))?;
        Ok(prettyplease::unparse(&file))
    }

    fn runtime_path(&self) -> Result<syn::Path, CompileError> {
        let path = format!("{}::runtime", self.config.runtime_crate);
        syn::parse_str(&path)
            .map_err(|e| CompileError::internal(format!("bad runtime crate path `{path}`: {e}")))
    }

    fn formatter_path(&self) -> Result<syn::Path, CompileError> {
        match &self.config.formatter {
            Some(path) => syn::parse_str(path).map_err(|e| {
                CompileError::internal(format!("formatter `{path}` is not a valid Rust path: {e}"))
            }),
            None => {
                let rt = self.runtime_path()?;
                Ok(syn::parse_quote!(#rt::DefaultFormatter))
            }
        }
    }

    fn escaper_path(&self) -> Result<syn::Path, CompileError> {
        let rt = self.runtime_path()?;
        match self.config.content_type.resolve() {
            ContentType::Html => Ok(syn::parse_quote!(#rt::HtmlEscaper)),
            ContentType::Plain => Ok(syn::parse_quote!(#rt::PlainEscaper)),
            ContentType::Auto => Err(CompileError::internal("content type not resolved")),
        }
    }

    // --- node lowering -------------------------------------------------------

    fn emit_nodes(&mut self, nodes: &[IrNode], mode: EmitMode) -> Result<Vec<TokenStream>, CompileError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            out.push(self.emit_node(node, mode)?);
        }
        Ok(out)
    }

    fn emit_node(&mut self, node: &IrNode, mode: EmitMode) -> Result<TokenStream, CompileError> {
        match node {
            IrNode::Text(literal) => self.emit_text(literal, mode),
            IrNode::Var { expr, escaped } => self.emit_var(expr, *escaped, mode),
            IrNode::ContextVar { keys, escaped } => self.emit_context_var(keys, *escaped),
            IrNode::Loop { expr, body } => self.emit_loop(expr, body, mode),
            IrNode::Gate { expr, body } => {
                let condition = self.gate_condition(expr);
                let body = self.emit_nodes(body, mode)?;
                Ok(quote! { if #condition { #(#body)* } })
            }
            IrNode::Presence { expr, body } => self.emit_presence(expr, body, mode),
            IrNode::Scope { expr, body } => self.emit_scope(expr, body, mode),
            IrNode::LambdaScope { expr, body } => self.emit_lambda_scope(expr, body, mode),
            IrNode::LambdaRaw { expr, raw_body, scope } => self.emit_lambda_raw(expr, raw_body, scope),
            IrNode::Inverted { expr, body } => {
                let condition = self.inverted_condition(expr);
                let body = self.emit_nodes(body, mode)?;
                Ok(quote! { if #condition { #(#body)* } })
            }
        }
    }

    fn emit_text(&self, literal: &str, mode: EmitMode) -> Result<TokenStream, CompileError> {
        match mode {
            EmitMode::Text => Ok(quote! { out.write_str(#literal)?; }),
            EmitMode::Encoded => {
                let bytes = encode_literal(literal, self.config.charset)?;
                let constant = Literal::byte_string(&bytes);
                Ok(quote! { out.write_bytes(#constant)?; })
            }
        }
    }

    fn emit_var(&mut self, expr: &ResolvedExpr, escaped: bool, _mode: EmitMode) -> Result<TokenStream, CompileError> {
        let chain = self.chain(expr);
        // A zero-argument lambda is invoked by its accessor step, so the
        // value to format is its result.
        let terminal = match expr.terminal.shape() {
            TypeShape::Lambda(LambdaShape { result, .. }) => result.clone(),
            _ => expr.terminal.clone(),
        };
        let write = if matches!(terminal.shape(), TypeShape::Nullable(_)) {
            let inner = self.format_value(quote!(__some), escaped)?;
            let value = self.bind(chain, |value| {
                quote! { if let Some(__some) = (#value).as_ref() { #inner } }
            });
            value
        } else {
            let format = self.format_value_deferred(escaped)?;
            self.bind(chain, |value| {
                let inner = format(quote!(&#value));
                quote! { #inner }
            })
        };
        Ok(write)
    }

    /// `formatter.format(value); escaper.escape(buffer); write(buffer)`,
    /// with the escaper skipped for raw interpolations.
    fn format_value(&self, value: TokenStream, escaped: bool) -> Result<TokenStream, CompileError> {
        Ok(self.format_value_deferred(escaped)?(value))
    }

    fn format_value_deferred(
        &self,
        escaped: bool,
    ) -> Result<Box<dyn Fn(TokenStream) -> TokenStream>, CompileError> {
        let rt = self.runtime_path()?;
        let formatter = self.formatter_path()?;
        let escaper = self.escaper_path()?;
        Ok(Box::new(move |value: TokenStream| {
            if escaped {
                quote! {
                    {
                        let __text = <#formatter as #rt::Formatter>::display(&#value);
                        <#escaper as #rt::Escaper>::escape(&__text, out)?;
                    }
                }
            } else {
                quote! {
                    {
                        let __text = <#formatter as #rt::Formatter>::display(&#value);
                        out.write_str(&__text)?;
                    }
                }
            }
        }))
    }

    fn emit_context_var(&mut self, keys: &[String], escaped: bool) -> Result<TokenStream, CompileError> {
        let lookup = if keys.is_empty() {
            quote!(ctx.value())
        } else {
            let mut chain = {
                let key = &keys[0];
                quote!(ctx.child(#key))
            };
            for key in &keys[1..] {
                chain = quote!(#chain.and_then(|__node| __node.child(#key)));
            }
            quote!(#chain.and_then(|__node| __node.value()))
        };
        let write = self.format_value(quote!(__ctx_text), escaped)?;
        // A missing key renders as empty, never fails.
        Ok(quote! {
            if let Some(__ctx_text) = #lookup {
                #write
            }
        })
    }

    fn emit_loop(&mut self, expr: &ResolvedExpr, body: &[IrNode], mode: EmitMode) -> Result<TokenStream, CompileError> {
        let frame_index = self.frames.len();
        let element = format_ident!("__e{frame_index}");
        let first = format_ident!("__first{frame_index}");
        let last = format_ident!("__last{frame_index}");
        let index = format_ident!("__idx{frame_index}");

        let uses_first = meta_used(body, frame_index, IterMeta::First);
        let uses_last = meta_used(body, frame_index, IterMeta::Last);
        let uses_index = meta_used(body, frame_index, IterMeta::Index);
        let needs_counter = uses_first || uses_index;

        self.frames.push(FrameVars {
            value: quote!(#element),
            first: first.clone(),
            last: last.clone(),
            index: index.clone(),
        });
        let body = self.emit_nodes(body, mode)?;
        self.frames.pop();

        let first_binding = uses_first.then(|| quote! { let #first = #index == 0; });
        let counter_init = needs_counter.then(|| quote! { let mut #index = 0usize; });
        let counter_bump = needs_counter.then(|| quote! { #index += 1; });

        let chain = self.chain(expr);
        Ok(self.bind(chain, |value| {
            if uses_last {
                let iter = format_ident!("__it{frame_index}");
                quote! {
                    {
                        #counter_init
                        let mut #iter = (#value).iter().peekable();
                        while let Some(#element) = #iter.next() {
                            let #last = #iter.peek().is_none();
                            #first_binding
                            #(#body)*
                            #counter_bump
                        }
                    }
                }
            } else {
                quote! {
                    {
                        #counter_init
                        for #element in (#value).iter() {
                            #first_binding
                            #(#body)*
                            #counter_bump
                        }
                    }
                }
            }
        }))
    }

    fn emit_presence(&mut self, expr: &ResolvedExpr, body: &[IrNode], mode: EmitMode) -> Result<TokenStream, CompileError> {
        let frame_index = self.frames.len();
        let bound = format_ident!("__f{frame_index}");
        self.push_plain_frame(quote!(#bound));
        let body = self.emit_nodes(body, mode)?;
        self.frames.pop();

        let chain = self.chain(expr);
        Ok(self.bind(chain, |value| {
            quote! {
                if let Some(#bound) = (#value).as_ref() {
                    #(#body)*
                }
            }
        }))
    }

    fn emit_scope(&mut self, expr: &ResolvedExpr, body: &[IrNode], mode: EmitMode) -> Result<TokenStream, CompileError> {
        let frame_index = self.frames.len();
        let bound = format_ident!("__f{frame_index}");
        self.push_plain_frame(quote!(#bound));
        let body = self.emit_nodes(body, mode)?;
        self.frames.pop();

        let chain = self.chain(expr);
        Ok(self.bind(chain, |value| {
            quote! {
                {
                    let #bound = &#value;
                    #(#body)*
                }
            }
        }))
    }

    fn emit_lambda_scope(&mut self, expr: &ResolvedExpr, body: &[IrNode], mode: EmitMode) -> Result<TokenStream, CompileError> {
        let call = self.lambda_call(expr, None)?;
        let frame_index = self.frames.len();
        let bound = format_ident!("__f{frame_index}");
        self.push_plain_frame(quote!(#bound));
        let body = self.emit_nodes(body, mode)?;
        self.frames.pop();

        Ok(self.bind(call, |value| {
            quote! {
                {
                    let __result = #value;
                    let #bound = &__result;
                    #(#body)*
                }
            }
        }))
    }

    /// The lambda result is template text; at run time it is re-parsed and
    /// re-rendered against the context the section was entered in. That
    /// context is materialized here: one `set_path` per name the resolver
    /// found reachable, inner frames inserted last so they shadow.
    fn emit_lambda_raw(
        &mut self,
        expr: &ResolvedExpr,
        raw_body: &str,
        scope: &[ScopeEntry],
    ) -> Result<TokenStream, CompileError> {
        let rt = self.runtime_path()?;
        let formatter = self.formatter_path()?;
        let escaper = self.escaper_path()?;
        let call = self.lambda_call(expr, Some(raw_body))?;

        let mut inserts = Vec::with_capacity(scope.len());
        for entry in scope {
            let Chain::Plain(value) = self.chain(&entry.expr) else {
                continue;
            };
            let keys = &entry.path;
            let insert = if matches!(entry.expr.terminal.shape(), TypeShape::Nullable(_)) {
                quote! {
                    if let Some(__v) = (#value).as_ref() {
                        __scope.set_path(&[#(#keys),*], <#formatter as #rt::Formatter>::display(&__v));
                    }
                }
            } else {
                quote! {
                    __scope.set_path(&[#(#keys),*], <#formatter as #rt::Formatter>::display(&#value));
                }
            };
            inserts.push(insert);
        }

        Ok(self.bind(call, |value| {
            quote! {
                {
                    let __raw = #value;
                    let mut __scope = #rt::MapContext::new();
                    #(#inserts)*
                    #rt::render_inline::<#escaper, _>(__raw.as_ref(), &__scope, out)?;
                }
            }
        }))
    }

    /// Builds the invocation for a lambda accessor, threading the raw body
    /// and/or the current element per the lambda's declared shape.
    fn lambda_call(&mut self, expr: &ResolvedExpr, raw_body: Option<&str>) -> Result<Chain, CompileError> {
        let TypeShape::Lambda(shape) = expr.terminal.shape() else {
            return Err(CompileError::internal("lambda emission over a non-lambda expression"));
        };
        let Some((Step::Method(name) | Step::Field(name), receiver_steps)) = expr.steps.split_last() else {
            return Err(CompileError::internal("lambda expression without an accessor step"));
        };
        let method = format_ident!("{name}");
        let element = self.frames.last().expect("frame stack").value.clone();
        let args = match (&shape.arg, raw_body) {
            (LambdaArg::None, _) => quote!(),
            (LambdaArg::Element, _) => quote!(#element),
            (LambdaArg::RawBody, Some(raw)) => quote!(#raw),
            (LambdaArg::RawBodyAndElement, Some(raw)) => quote!(#raw, #element),
            (LambdaArg::RawBody | LambdaArg::RawBodyAndElement, None) => {
                return Err(CompileError::internal("raw-body lambda without a captured body"));
            }
        };

        let receiver = self.partial_chain(expr.frame, receiver_steps);
        Ok(match receiver {
            Chain::Plain(r) => Chain::Plain(quote!(#r.#method(#args))),
            Chain::Optional(r) => Chain::Optional(quote!(#r.map(|__recv| __recv.#method(#args)))),
        })
    }

    // --- chains and conditions -----------------------------------------------

    fn chain(&self, expr: &ResolvedExpr) -> Chain {
        if let Some(meta) = expr.meta {
            let vars = &self.frames[expr.frame];
            let ident = match meta {
                IterMeta::First => &vars.first,
                IterMeta::Last => &vars.last,
                IterMeta::Index => &vars.index,
            };
            return Chain::Plain(quote!(#ident));
        }
        self.partial_chain(expr.frame, &expr.steps)
    }

    fn partial_chain(&self, frame: usize, steps: &[Step]) -> Chain {
        let mut tokens = self.frames[frame].value.clone();
        let mut fallible = false;
        for step in steps {
            match step {
                Step::Field(name) => {
                    let field = format_ident!("{name}");
                    tokens = if fallible {
                        quote!(#tokens.map(|__v| &__v.#field))
                    } else {
                        quote!(#tokens.#field)
                    };
                }
                Step::Method(name) => {
                    let method = format_ident!("{name}");
                    tokens = if fallible {
                        quote!(#tokens.map(|__v| __v.#method()))
                    } else {
                        quote!(#tokens.#method())
                    };
                }
                Step::MapKey(key) => {
                    tokens = if fallible {
                        quote!(#tokens.and_then(|__v| __v.get(#key)))
                    } else {
                        quote!(#tokens.get(#key))
                    };
                    fallible = true;
                }
            }
        }
        if fallible {
            Chain::Optional(tokens)
        } else {
            Chain::Plain(tokens)
        }
    }

    /// Runs `body` with the chain's value in scope, wrapping in an `if let`
    /// when the chain can miss.
    fn bind(&mut self, chain: Chain, body: impl FnOnce(TokenStream) -> TokenStream) -> TokenStream {
        match chain {
            Chain::Plain(tokens) => body(tokens),
            Chain::Optional(tokens) => {
                self.binding_seq += 1;
                let bound = format_ident!("__opt{}", self.binding_seq);
                let inner = body(quote!(#bound));
                quote! {
                    if let Some(#bound) = #tokens {
                        #inner
                    }
                }
            }
        }
    }

    fn gate_condition(&self, expr: &ResolvedExpr) -> TokenStream {
        match self.chain(expr) {
            Chain::Plain(tokens) => quote!(#tokens),
            // A boolean behind a map lookup: absent counts as false.
            Chain::Optional(tokens) => quote!(#tokens.copied().unwrap_or(false)),
        }
    }

    /// Mustache falsy rules: null, false, empty iterable/array, absent key.
    fn inverted_condition(&self, expr: &ResolvedExpr) -> TokenStream {
        match self.chain(expr) {
            Chain::Optional(tokens) => quote!(#tokens.is_none()),
            Chain::Plain(tokens) => match expr.terminal.shape() {
                TypeShape::Boolean => quote!(!#tokens),
                TypeShape::Nullable(_) => quote!((#tokens).is_none()),
                TypeShape::Iterable(_) | TypeShape::Array(_) => {
                    quote!((#tokens).iter().next().is_none())
                }
                _ => quote!(false),
            },
        }
    }

    fn push_plain_frame(&mut self, value: TokenStream) {
        self.frames.push(FrameVars {
            value,
            first: format_ident!("__unused_first{}", self.frames.len()),
            last: format_ident!("__unused_last{}", self.frames.len()),
            index: format_ident!("__unused_idx{}", self.frames.len()),
        });
    }
}

/// Pre-encodes a literal in the template charset for the byte-sink path.
fn encode_literal(literal: &str, charset: Charset) -> Result<Vec<u8>, CompileError> {
    match charset {
        Charset::Utf8 => Ok(literal.as_bytes().to_vec()),
        Charset::Latin1 => literal
            .chars()
            .map(|c| {
                u8::try_from(c as u32).map_err(|_| {
                    CompileError::io(format!("literal character `{c}` is not representable in ISO-8859-1"))
                })
            })
            .collect(),
    }
}

/// True if any expression in `nodes` reads the given loop pseudo-member of
/// the frame opened at `frame`.
fn meta_used(nodes: &[IrNode], frame: usize, meta: IterMeta) -> bool {
    nodes.iter().any(|node| match node {
        IrNode::Text(_) => false,
        IrNode::Var { expr, .. } => expr.frame == frame && expr.meta == Some(meta),
        IrNode::ContextVar { .. } => false,
        IrNode::Loop { expr, body }
        | IrNode::Gate { expr, body }
        | IrNode::Presence { expr, body }
        | IrNode::Scope { expr, body }
        | IrNode::LambdaScope { expr, body }
        | IrNode::Inverted { expr, body } => {
            (expr.frame == frame && expr.meta == Some(meta)) || meta_used(body, frame, meta)
        }
        IrNode::LambdaRaw { expr, .. } => expr.frame == frame && expr.meta == Some(meta),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{parser, resolve};
    use crate::descriptor::{LambdaArg as Arg, TypeDescriptor, TypeRef};

    fn model() -> TypeRef {
        let person = TypeDescriptor::record("Person")
            .field("name", TypeDescriptor::text())
            .build();
        TypeDescriptor::record("crate::HelloWorld")
            .field("message", TypeDescriptor::text())
            .field("people", TypeDescriptor::iterable(person))
            .field("admin", TypeDescriptor::boolean())
            .field("nick", TypeDescriptor::nullable(TypeDescriptor::text()))
            .lambda("wrap", Arg::RawBody, TypeDescriptor::text())
            .build()
    }

    fn generate(template: &str) -> String {
        let ast = parser::parse(template).expect("parse");
        let ir = resolve::resolve(&ast, model()).expect("resolve");
        let config = CodegenConfig::new("HelloWorldRenderer", "crate::HelloWorld");
        Codegen::new(config).generate_file(&ir).expect("codegen")
    }

    #[test]
    fn emitted_source_parses_and_names_the_renderer() {
        let source = generate("Hello {{message}}!");
        assert!(source.contains("pub struct HelloWorldRenderer;"));
        assert!(source.contains("impl ::stacheforge::runtime::Renderer for HelloWorldRenderer"));
        assert!(source.contains("type Model = crate::HelloWorld;"));
    }

    #[test]
    fn literals_are_coalesced_into_single_writes() {
        let source = generate("a\nb{{! split by a comment }}c");
        assert!(source.contains(r#"out.write_str("a\nbc")?;"#));
    }

    #[test]
    fn escaped_variables_run_through_the_escaper() {
        let source = generate("{{message}}");
        assert!(source.contains("HtmlEscaper"));
        assert!(source.contains("Formatter>::display"));
    }

    #[test]
    fn raw_variables_skip_the_escaper() {
        let source = generate("{{{message}}}");
        assert!(!source.contains("HtmlEscaper"));
        assert!(source.contains("out.write_str(&__text)?;"));
    }

    #[test]
    fn loops_emit_peekable_only_when_last_is_used() {
        let plain = generate("{{#people}}{{name}}{{/people}}");
        assert!(plain.contains("for __e1 in (model.people).iter()"));
        assert!(!plain.contains("peekable"));

        let with_last = generate("{{#people}}{{#-last}}!{{/-last}}{{/people}}");
        assert!(with_last.contains("peekable"));
        assert!(with_last.contains("__last1"));
    }

    #[test]
    fn index_counter_appears_only_when_needed() {
        let source = generate("{{#people}}{{-index}}{{/people}}");
        assert!(source.contains("__idx1 += 1"));

        let without = generate("{{#people}}x{{/people}}");
        assert!(!without.contains("__idx1"));
    }

    #[test]
    fn nullable_variable_renders_empty_when_absent() {
        let source = generate("{{nick}}");
        assert!(source.contains("if let Some(__some) = (model.nick).as_ref()"));
    }

    #[test]
    fn boolean_section_is_a_plain_conditional() {
        let source = generate("{{#admin}}yes{{/admin}}");
        assert!(source.contains("if model.admin"));
    }

    #[test]
    fn inverted_list_section_tests_emptiness() {
        let source = generate("{{^people}}none{{/people}}");
        assert!(source.contains("(model.people).iter().next().is_none()"));
    }

    #[test]
    fn encoded_body_preencodes_literals() {
        let source = generate("hi");
        assert!(source.contains("out.write_bytes(b\"hi\")?;"));
    }

    #[test]
    fn latin1_literals_are_encoded_bytewise() {
        let ast = parser::parse("é").expect("parse");
        let ir = resolve::resolve(&ast, model()).expect("resolve");
        let mut config = CodegenConfig::new("R", "crate::HelloWorld");
        config.charset = Charset::Latin1;
        let source = Codegen::new(config).generate_file(&ir).expect("codegen");
        assert!(source.contains(r#"b"\xE9""#) || source.contains(r#"b"\xe9""#));
    }

    #[test]
    fn raw_lambda_rerenders_through_the_inline_renderer() {
        let source = generate("{{#wrap}}hi {{message}}{{/wrap}}");
        assert!(source.contains(r#"model.wrap("hi {{message}}")"#), "{source}");
        assert!(source.contains("render_inline"));
        assert!(source.contains(r#"set_path(&["message"]"#));
        // Nullable members only join the scope when present.
        assert!(source.contains(r#"if let Some(__v) = (model.nick).as_ref()"#));
        assert!(source.contains(r#"set_path(&["nick"]"#));
    }

    #[test]
    fn context_lookup_renders_missing_keys_as_empty() {
        let ast = parser::parse("{{@context.csrf.token}}").expect("parse");
        let ir = resolve::resolve(&ast, model()).expect("resolve");
        let config = CodegenConfig::new("R", "crate::HelloWorld");
        let source = Codegen::new(config).generate_file(&ir).expect("codegen");
        assert!(source.contains(r#"ctx.child("csrf")"#));
        assert!(source.contains("and_then"));
        assert!(source.contains("if let Some(__ctx_text)"));
    }

    #[test]
    fn marker_interfaces_get_empty_impls() {
        let ast = parser::parse("x").expect("parse");
        let ir = resolve::resolve(&ast, model()).expect("resolve");
        let mut config = CodegenConfig::new("R", "crate::HelloWorld");
        config.renderer_interfaces = vec!["crate::Reloadable".to_string()];
        let source = Codegen::new(config).generate_file(&ir).expect("codegen");
        assert!(source.contains("impl crate::Reloadable for R {}"));
    }
}
