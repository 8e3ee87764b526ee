//! Runtime-contract tests: renderers written by hand in exactly the shape
//! the emitter produces, driven against the runtime crate half. These pin
//! the rendered output of the canonical scenarios.

use std::any::TypeId;
use std::convert::Infallible;

use stacheforge::config::Charset;
use stacheforge::runtime::{
    ContextNode, ContextValue, EmptyContext, EncodedBuffer, EncodedOutput, Escaper, Formatter,
    HtmlEscaper, MapContext, Output, Registry, RenderError, Renderer,
};

struct Person {
    name: String,
}

struct HelloWorld {
    message: String,
    people: Vec<Person>,
}

fn hello(message: &str, names: &[&str]) -> HelloWorld {
    HelloWorld {
        message: message.to_string(),
        people: names
            .iter()
            .map(|n| Person { name: n.to_string() })
            .collect(),
    }
}

/// Renderer for
/// `{{#people}}{{message}} {{name}}!{{#-last}} done{{/-last}}\n{{/people}}`,
/// written the way codegen lowers it.
struct HelloWorldRenderer;

impl Renderer for HelloWorldRenderer {
    type Model = HelloWorld;

    const TEMPLATE_CHARSET: Charset = Charset::Utf8;

    fn execute_with<O, C>(model: &HelloWorld, out: &mut O, _ctx: &C) -> Result<(), O::Error>
    where
        O: Output + ?Sized,
        C: ContextNode + ?Sized,
    {
        {
            let mut __it1 = (model.people).iter().peekable();
            while let Some(__e1) = __it1.next() {
                let __last1 = __it1.peek().is_none();
                {
                    let __text =
                        <stacheforge::runtime::DefaultFormatter as Formatter>::display(&&model.message);
                    <HtmlEscaper as Escaper>::escape(&__text, out)?;
                }
                out.write_str(" ")?;
                {
                    let __text =
                        <stacheforge::runtime::DefaultFormatter as Formatter>::display(&&__e1.name);
                    <HtmlEscaper as Escaper>::escape(&__text, out)?;
                }
                out.write_str("!")?;
                if __last1 {
                    out.write_str(" done")?;
                }
                out.write_str("\n")?;
            }
        }
        Ok(())
    }

    fn encode_with<O, C>(model: &HelloWorld, out: &mut O, ctx: &C) -> Result<(), O::Error>
    where
        O: EncodedOutput + ?Sized,
        C: ContextNode + ?Sized,
    {
        // Identical shape; literals pre-encoded (UTF-8, so byte-identical).
        let mut __it1 = (model.people).iter().peekable();
        while let Some(__e1) = __it1.next() {
            let __last1 = __it1.peek().is_none();
            {
                let __text =
                    <stacheforge::runtime::DefaultFormatter as Formatter>::display(&&model.message);
                <HtmlEscaper as Escaper>::escape(&__text, out)?;
            }
            out.write_bytes(b" ")?;
            {
                let __text =
                    <stacheforge::runtime::DefaultFormatter as Formatter>::display(&&__e1.name);
                <HtmlEscaper as Escaper>::escape(&__text, out)?;
            }
            out.write_bytes(b"!")?;
            if __last1 {
                out.write_bytes(b" done")?;
            }
            out.write_bytes(b"\n")?;
        }
        let _ = ctx;
        Ok(())
    }
}

fn render_hello(model: &HelloWorld) -> String {
    let mut out = String::new();
    HelloWorldRenderer::execute(model, &mut out).unwrap();
    out
}

#[test]
fn hello_list_renders_with_last_marker() {
    let model = hello("Hi", &["Ann", "Bo"]);
    assert_eq!(render_hello(&model), "Hi Ann!\nHi Bo! done\n");
}

#[test]
fn empty_list_renders_nothing() {
    let model = hello("Hi", &[]);
    assert_eq!(render_hello(&model), "");
}

#[test]
fn escaped_values_are_html_safe() {
    let model = hello("<b>", &["&"]);
    assert_eq!(render_hello(&model), "&lt;b&gt; &amp;! done\n");
}

#[test]
fn write_path_produces_the_execute_output_encoded() {
    let model = hello("Hi", &["Ann"]);
    let text = render_hello(&model);

    let mut sink = EncodedBuffer::new(Charset::Utf8);
    HelloWorldRenderer::write(&model, &mut sink).unwrap();
    assert_eq!(sink.as_bytes(), text.as_bytes());
}

#[test]
fn write_path_rejects_mismatched_charsets() {
    let model = hello("Hi", &["Ann"]);
    let mut sink = EncodedBuffer::new(Charset::Latin1);
    let err = HelloWorldRenderer::write(&model, &mut sink).unwrap_err();
    match err {
        RenderError::UnsupportedCharset { template, output } => {
            assert_eq!(template, Charset::Utf8);
            assert_eq!(output, Charset::Latin1);
        }
        RenderError::Sink(e) => match e {},
    }
    assert!(sink.as_bytes().is_empty(), "nothing may be written before the check");
}

#[test]
fn renderer_registers_and_dispatches_dynamically() {
    fn render(model: &HelloWorld, out: &mut String) -> Result<(), Infallible> {
        HelloWorldRenderer::execute(model, out)
    }
    let mut registry = Registry::new();
    registry.register(stacheforge::runtime::RegistryEntry::new::<HelloWorld>(
        "HelloWorldRenderer",
        render,
    ));

    assert!(registry.supports_type(TypeId::of::<HelloWorld>()));
    assert!(HelloWorldRenderer::supports_type(TypeId::of::<HelloWorld>()));

    let out = registry.render(&hello("Hi", &["Ann"])).unwrap();
    assert_eq!(out, "Hi Ann! done\n");

    assert!(registry.render(&42_u8).is_err());
}

/// Renderer shape for `{{@context.user}}{{^missing}}{{/missing}}`-style
/// ambient lookups.
struct ContextProbe;

impl Renderer for ContextProbe {
    type Model = ();

    const TEMPLATE_CHARSET: Charset = Charset::Utf8;

    fn execute_with<O, C>(_model: &(), out: &mut O, ctx: &C) -> Result<(), O::Error>
    where
        O: Output + ?Sized,
        C: ContextNode + ?Sized,
    {
        if let Some(__ctx_text) = ctx.child("user").and_then(|__node| __node.value()) {
            let __text = <stacheforge::runtime::DefaultFormatter as Formatter>::display(&&__ctx_text);
            <HtmlEscaper as Escaper>::escape(&__text, out)?;
        }
        Ok(())
    }

    fn encode_with<O, C>(model: &(), out: &mut O, ctx: &C) -> Result<(), O::Error>
    where
        O: EncodedOutput + ?Sized,
        C: ContextNode + ?Sized,
    {
        Self::execute_with(model, out, ctx)
    }
}

#[test]
fn lambda_returned_templates_rerender_in_the_materialized_scope() {
    // The shape generated for a raw-body lambda section: invoke the lambda
    // with the literal body, materialize the visible frames, re-render.
    fn wrap(body: &str) -> String {
        format!("<hello>{body}</hello>: {{{{name}}}}")
    }

    let mut scope = MapContext::new();
    scope.set_path(&["name"], "A<B");
    scope.set_path(&["person", "city"], "Oslo");

    let raw = wrap("{{person.city}}");
    let mut out = String::new();
    stacheforge::runtime::render_inline::<HtmlEscaper, _>(&raw, &scope, &mut out).unwrap();
    assert_eq!(out, "<hello>Oslo</hello>: A&lt;B");

    // A lambda that returns malformed template text renders it verbatim.
    let mut out = String::new();
    stacheforge::runtime::render_inline::<HtmlEscaper, _>("{{broken", &scope, &mut out).unwrap();
    assert_eq!(out, "{{broken");
}

#[test]
fn ambient_context_lookups_render_or_go_empty() {
    let ctx = MapContext::new().with("user", ContextValue::text("ana"));
    let mut out = String::new();
    ContextProbe::execute_with(&(), &mut out, &ctx).unwrap();
    assert_eq!(out, "ana");

    let mut out = String::new();
    ContextProbe::execute_with(&(), &mut out, &EmptyContext).unwrap();
    assert_eq!(out, "", "a missing key renders as empty");
}
