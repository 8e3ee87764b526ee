//! Runtime re-rendering of lambda-returned template text.
//!
//! A raw-body lambda returns template text whose content is only known at
//! render time, so it cannot be lowered to straight-line writes ahead of
//! time. Instead the generated code materializes the section's context into
//! a [`ContextNode`] tree and calls [`render_inline`], which re-parses the
//! returned text with the compiler's own lexer and parser and resolves
//! names dynamically against the tree. Dynamic semantics match the ambient
//! context: a missing name renders as empty; nothing here is fatal. Text
//! that does not parse as a template is written verbatim.

use crate::compiler::ast::{AstNode, Path};
use crate::compiler::parser;
use crate::runtime::context::ContextNode;
use crate::runtime::escape::Escaper;
use crate::runtime::output::Output;

/// Re-renders `template` against `scope`, escaping interpolations with `E`.
pub fn render_inline<E: Escaper, O: Output + ?Sized>(
    template: &str,
    scope: &dyn ContextNode,
    out: &mut O,
) -> Result<(), O::Error> {
    match parser::parse(template) {
        Ok(nodes) => render_nodes::<E, O>(&nodes, &mut vec![scope], out),
        Err(_) => out.write_str(template),
    }
}

fn render_nodes<'a, E: Escaper, O: Output + ?Sized>(
    nodes: &[AstNode],
    scopes: &mut Vec<&'a dyn ContextNode>,
    out: &mut O,
) -> Result<(), O::Error> {
    for node in nodes {
        match node {
            AstNode::Text { literal, .. } => out.write_str(literal)?,
            AstNode::Var { path, escaped } => {
                if let Some(text) = find(scopes, path).and_then(|n| n.value()) {
                    if *escaped {
                        E::escape(&text, out)?;
                    } else {
                        out.write_str(&text)?;
                    }
                }
            }
            AstNode::Section { path, children, .. } => match find(scopes, path) {
                Some(node) => match node.value() {
                    // A leaf gates on its text; a map becomes a new frame.
                    Some(value) => {
                        if truthy(&value) {
                            render_nodes::<E, O>(children, scopes, out)?;
                        }
                    }
                    None => {
                        scopes.push(node);
                        render_nodes::<E, O>(children, scopes, out)?;
                        scopes.pop();
                    }
                },
                None => {}
            },
            AstNode::Inverted { path, children } => {
                let falsy = match find(scopes, path) {
                    None => true,
                    Some(node) => node.value().is_some_and(|v| !truthy(&v)),
                };
                if falsy {
                    render_nodes::<E, O>(children, scopes, out)?;
                }
            }
            // Includes cannot be resolved without a loader at render time.
            AstNode::Partial { .. } | AstNode::Parent { .. } | AstNode::Block { .. } => {}
        }
    }
    Ok(())
}

fn truthy(value: &str) -> bool {
    !value.is_empty() && value != "false"
}

/// Dynamic name binding: the head searches the scope stack top-down, later
/// segments walk child nodes only.
fn find<'a>(scopes: &[&'a dyn ContextNode], path: &Path) -> Option<&'a dyn ContextNode> {
    if path.is_self() {
        return scopes.last().copied();
    }
    let head = path.segments.first()?;
    let mut node = scopes.iter().rev().find_map(|scope| scope.child(head))?;
    for segment in &path.segments[1..] {
        node = node.child(segment)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::MapContext;
    use crate::runtime::escape::HtmlEscaper;

    fn scope() -> MapContext {
        let mut scope = MapContext::new();
        scope.set_path(&["name"], "A<B");
        scope.set_path(&["person", "city"], "Oslo");
        scope.set_path(&["flag"], "true");
        scope.set_path(&["off"], "false");
        scope
    }

    fn render(template: &str) -> String {
        let mut out = String::new();
        render_inline::<HtmlEscaper, _>(template, &scope(), &mut out).unwrap();
        out
    }

    #[test]
    fn interpolations_escape_and_missing_names_go_empty() {
        assert_eq!(render("hi {{name}}{{missing}}!"), "hi A&lt;B!");
        assert_eq!(render("{{{name}}}"), "A<B");
    }

    #[test]
    fn dotted_names_walk_child_nodes() {
        assert_eq!(render("from {{person.city}}"), "from Oslo");
    }

    #[test]
    fn section_over_a_map_opens_a_frame() {
        assert_eq!(render("{{#person}}{{city}}/{{name}}{{/person}}"), "Oslo/A&lt;B");
    }

    #[test]
    fn leaf_sections_gate_on_their_text() {
        assert_eq!(render("{{#flag}}on{{/flag}}{{#off}}never{{/off}}"), "on");
        assert_eq!(render("{{^off}}inverted{{/off}}{{^missing}}gone{{/missing}}"), "invertedgone");
    }

    #[test]
    fn malformed_template_text_is_written_verbatim() {
        assert_eq!(render("oops {{unclosed"), "oops {{unclosed");
    }

    #[test]
    fn includes_inside_lambda_output_render_nothing() {
        assert_eq!(render("a{{>p}}b"), "ab");
    }
}
