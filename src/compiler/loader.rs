//! Template loading and eager partial/parent resolution.
//!
//! A template reference resolves in order: inline literal, configured path
//! (through the path-mapping rules), then `<ModelName>.mustache`. Partial
//! names go through the partial-mapping table first and otherwise resolve
//! like template paths. All partials and parents are inlined eagerly and
//! recursively, bounded by a depth limit so cyclic includes fail instead of
//! looping. The loader owns charset decoding.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use crate::compiler::ast::{AstNode, coalesce_text};
use crate::compiler::diagnostics::{CompileError, Span};
use crate::compiler::parser;
use crate::config::{Charset, TemplateConfig};

/// Maximum include nesting before a partial/parent chain is declared cyclic.
pub const DEFAULT_DEPTH_LIMIT: usize = 32;

/// Reads raw template bytes from a classpath-like root. File I/O beyond this
/// contract is the caller's concern.
pub trait ResourceLoader {
    fn load(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Loads resources relative to a directory root.
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceLoader for DirLoader {
    fn load(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(path))
    }
}

/// In-memory loader, used by tests and for ad-hoc compilation without a
/// template directory.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.entries.insert(path.into(), contents.into());
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> io::Result<Vec<u8>> {
        self.entries
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such template: {path}")))
    }
}

/// A fully loaded template: parsed, decoded, and with every partial, parent,
/// and block inlined.
#[derive(Debug)]
pub struct Template {
    /// Where the template came from, for diagnostics (`<inline>` or a path).
    pub source_name: String,
    pub charset: Charset,
    pub root: Vec<AstNode>,
    /// Names of all partials and parents the template referenced.
    pub partials: BTreeSet<String>,
}

pub struct TemplateLoader<'a> {
    resources: &'a dyn ResourceLoader,
    config: &'a TemplateConfig,
    depth_limit: usize,
}

impl<'a> TemplateLoader<'a> {
    pub fn new(resources: &'a dyn ResourceLoader, config: &'a TemplateConfig) -> Self {
        Self {
            resources,
            config,
            depth_limit: DEFAULT_DEPTH_LIMIT,
        }
    }

    pub fn with_depth_limit(mut self, limit: usize) -> Self {
        self.depth_limit = limit;
        self
    }

    /// Loads, parses, and fully inlines the template for one model.
    pub fn load_for_model(&self, model_simple_name: &str) -> Result<Template, CompileError> {
        let charset = self.config.resolved_charset().ok_or_else(|| {
            CompileError::io(format!("unsupported template charset `{}`", self.config.charset))
        })?;

        let (source_name, source) = if !self.config.template.is_empty() {
            ("<inline>".to_string(), self.config.template.clone())
        } else {
            let path = if self.config.path.is_empty() {
                format!("{model_simple_name}.mustache")
            } else {
                self.config.path.clone()
            };
            let path = self.config.remap_path(&path);
            let source = self.read(&path, charset)?;
            (path, source)
        };

        let ast = parser::parse(&source)?;
        let mut partials = BTreeSet::new();
        let root = self.inline(ast, charset, 0, &mut partials)?;
        let root = coalesce_text(strip_blocks(root));
        Ok(Template { source_name, charset, root, partials })
    }

    fn read(&self, path: &str, charset: Charset) -> Result<String, CompileError> {
        let bytes = self
            .resources
            .load(path)
            .map_err(|e| CompileError::io(format!("cannot load template `{path}`: {e}")))?;
        decode(bytes, charset, path)
    }

    /// Loads a partial or parent by name: the partial-mapping table first,
    /// then path resolution with `.mustache` appended to extensionless names.
    fn load_named(
        &self,
        name: &str,
        span: Span,
        charset: Charset,
    ) -> Result<Vec<AstNode>, CompileError> {
        let source = if let Some(mapping) = self.config.partial(name) {
            if !mapping.template.is_empty() {
                mapping.template.clone()
            } else if !mapping.path.is_empty() {
                self.read(&self.config.remap_path(&mapping.path), charset)?
            } else {
                return Err(CompileError::structure(
                    span,
                    format!("partial mapping for `{name}` names neither a template nor a path"),
                ));
            }
        } else {
            let mut path = self.config.remap_path(name);
            if !path.contains('.') {
                path.push_str(".mustache");
            }
            self.read(&path, charset)?
        };
        parser::parse(&source)
            .map_err(|e| e.with_context(format!("in partial `{name}`")))
    }

    /// Splices partials and parents into the tree, recursively, bounded by
    /// the depth limit.
    fn inline(
        &self,
        nodes: Vec<AstNode>,
        charset: Charset,
        depth: usize,
        partials: &mut BTreeSet<String>,
    ) -> Result<Vec<AstNode>, CompileError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                AstNode::Partial { name, indent, span } => {
                    if depth >= self.depth_limit {
                        return Err(CompileError::structure(
                            span,
                            format!("partial `{name}` exceeds include depth limit {}", self.depth_limit),
                        ));
                    }
                    partials.insert(name.clone());
                    let sub = self.load_named(&name, span, charset)?;
                    let mut sub = self.inline(sub, charset, depth + 1, partials)?;
                    apply_indent(&mut sub, &indent, span);
                    out.extend(sub);
                }
                AstNode::Parent { name, overrides, span } => {
                    if depth >= self.depth_limit {
                        return Err(CompileError::structure(
                            span,
                            format!("parent `{name}` exceeds include depth limit {}", self.depth_limit),
                        ));
                    }
                    partials.insert(name.clone());
                    let mut resolved_overrides = Vec::with_capacity(overrides.len());
                    for (block, children) in overrides {
                        resolved_overrides.push((block, self.inline(children, charset, depth, partials)?));
                    }
                    let sub = self.load_named(&name, span, charset)?;
                    let sub = self.inline(sub, charset, depth + 1, partials)?;
                    out.extend(rewrite_blocks(sub, &resolved_overrides));
                }
                AstNode::Section { path, children, raw_body } => {
                    out.push(AstNode::Section {
                        path,
                        children: self.inline(children, charset, depth, partials)?,
                        raw_body,
                    });
                }
                AstNode::Inverted { path, children } => {
                    out.push(AstNode::Inverted {
                        path,
                        children: self.inline(children, charset, depth, partials)?,
                    });
                }
                AstNode::Block { name, children, span } => {
                    out.push(AstNode::Block {
                        name,
                        children: self.inline(children, charset, depth, partials)?,
                        span,
                    });
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }
}

impl CompileError {
    fn with_context(self, context: String) -> CompileError {
        match self {
            CompileError::Syntax { message, span } => {
                CompileError::Syntax { message: format!("{context}: {message}"), span }
            }
            CompileError::Structure { message, span } => {
                CompileError::Structure { message: format!("{context}: {message}"), span }
            }
            CompileError::Resolve { message, span } => {
                CompileError::Resolve { message: format!("{context}: {message}"), span }
            }
            CompileError::Io { message } => CompileError::Io { message: format!("{context}: {message}") },
            CompileError::Internal { message } => {
                CompileError::Internal { message: format!("{context}: {message}") }
            }
        }
    }
}

fn decode(bytes: Vec<u8>, charset: Charset, path: &str) -> Result<String, CompileError> {
    match charset {
        Charset::Utf8 => String::from_utf8(bytes)
            .map_err(|e| CompileError::io(format!("template `{path}` is not valid UTF-8: {e}"))),
        Charset::Latin1 => Ok(bytes.into_iter().map(|b| b as char).collect()),
    }
}

/// Replaces blocks named by `overrides` with the override bodies, keeping the
/// block wrapper so an outer child template can override again. Blocks not
/// named keep their defaults.
fn rewrite_blocks(nodes: Vec<AstNode>, overrides: &[(String, Vec<AstNode>)]) -> Vec<AstNode> {
    nodes
        .into_iter()
        .map(|node| match node {
            AstNode::Block { name, children, span } => {
                match overrides.iter().find(|(n, _)| *n == name) {
                    Some((_, replacement)) => AstNode::Block {
                        name,
                        children: replacement.clone(),
                        span,
                    },
                    None => AstNode::Block {
                        name,
                        children: rewrite_blocks(children, overrides),
                        span,
                    },
                }
            }
            AstNode::Section { path, children, raw_body } => AstNode::Section {
                path,
                children: rewrite_blocks(children, overrides),
                raw_body,
            },
            AstNode::Inverted { path, children } => AstNode::Inverted {
                path,
                children: rewrite_blocks(children, overrides),
            },
            other => other,
        })
        .collect()
}

/// Final pass: every remaining block renders its (possibly overridden)
/// children, so the finished tree has no inheritance nodes at all.
fn strip_blocks(nodes: Vec<AstNode>) -> Vec<AstNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            AstNode::Block { children, .. } => out.extend(strip_blocks(children)),
            AstNode::Section { path, children, raw_body } => out.push(AstNode::Section {
                path,
                children: strip_blocks(children),
                raw_body,
            }),
            AstNode::Inverted { path, children } => out.push(AstNode::Inverted {
                path,
                children: strip_blocks(children),
            }),
            other => out.push(other),
        }
    }
    out
}

/// Prefixes each line of an inlined partial with the indentation of its
/// include tag (Mustache indentation rule). The partial's own trailing
/// newline, if any, is left bare so it does not emit a dangling indent.
fn apply_indent(nodes: &mut Vec<AstNode>, indent: &str, span: Span) {
    if indent.is_empty() {
        return;
    }

    let total = count_text_nodes(nodes);
    if total > 0 {
        let mut seen = 0;
        indent_text_nodes(nodes, indent, total, &mut seen);
    }
    nodes.insert(0, AstNode::Text { literal: indent.to_string(), span });
}

fn count_text_nodes(nodes: &[AstNode]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            AstNode::Text { .. } => 1,
            AstNode::Section { children, .. }
            | AstNode::Inverted { children, .. }
            | AstNode::Block { children, .. } => count_text_nodes(children),
            _ => 0,
        })
        .sum()
}

fn indent_text_nodes(nodes: &mut [AstNode], indent: &str, total: usize, seen: &mut usize) {
    for node in nodes {
        match node {
            AstNode::Text { literal, .. } => {
                *seen += 1;
                let is_last = *seen == total;
                let spare_trailing = is_last && literal.ends_with('\n');
                let body = if spare_trailing {
                    &literal[..literal.len() - 1]
                } else {
                    literal.as_str()
                };
                let mut replaced = body.replace('\n', &format!("\n{indent}"));
                if spare_trailing {
                    replaced.push('\n');
                }
                *literal = replaced;
            }
            AstNode::Section { children, .. }
            | AstNode::Inverted { children, .. }
            | AstNode::Block { children, .. } => {
                indent_text_nodes(children, indent, total, seen);
            }
            _ => {}
        }
    }
}
