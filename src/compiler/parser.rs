//! Parser: token stream to block-structured AST.
//!
//! The parser keeps a stack of open section/inheritance frames and appends
//! children to the innermost one. It is strict: every close tag must spell
//! the identical dotted name as its open tag, parents admit only blocks and
//! whitespace as direct children, and any unrecognized nesting is fatal.

use crate::compiler::ast::{AstNode, Path, Token, TokenKind, coalesce_text};
use crate::compiler::diagnostics::{CompileError, Span};
use crate::compiler::lexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Root,
    Section,
    Inverted,
    Parent,
    Block,
}

struct Frame {
    kind: FrameKind,
    /// Dotted name as spelled in the open tag; empty for the root.
    name: String,
    span: Span,
    /// Byte offset just past the open tag, for raw-body capture.
    body_start: usize,
    children: Vec<AstNode>,
    /// Collected block overrides; only used by `Parent` frames.
    overrides: Vec<(String, Vec<AstNode>)>,
}

impl Frame {
    fn new(kind: FrameKind, name: String, span: Span, body_start: usize) -> Self {
        Self {
            kind,
            name,
            span,
            body_start,
            children: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

pub struct Parser<'src> {
    source: &'src str,
    stack: Vec<Frame>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            stack: vec![Frame::new(FrameKind::Root, String::new(), Span::new(1, 1), 0)],
        }
    }

    /// Tokenizes and parses the source into a template AST with adjacent
    /// literals coalesced.
    pub fn parse(mut self) -> Result<Vec<AstNode>, CompileError> {
        let tokens = lexer::tokenize(self.source)?;
        for token in tokens {
            self.accept(token)?;
        }
        let root = self
            .stack
            .pop()
            .ok_or_else(|| CompileError::internal("parser stack underflow"))?;
        Ok(coalesce_text(root.children))
    }

    fn accept(&mut self, token: Token) -> Result<(), CompileError> {
        match token.kind {
            TokenKind::Text(literal) => {
                if self.in_parent_body() {
                    if literal.trim().is_empty() {
                        // Whitespace between blocks of a parent is dropped.
                        return Ok(());
                    }
                    return Err(CompileError::structure(
                        token.span,
                        "only block tags may appear inside a parent section",
                    ));
                }
                self.push_child(AstNode::Text { literal, span: token.span });
                Ok(())
            }
            TokenKind::Interpolation { name, escaped } => {
                self.reject_in_parent(token.span, "interpolation")?;
                let path = Path::parse(&name, token.span);
                self.push_child(AstNode::Var { path, escaped });
                Ok(())
            }
            TokenKind::SectionOpen(name) => {
                self.reject_in_parent(token.span, "section")?;
                self.stack.push(Frame::new(FrameKind::Section, name, token.span, token.end));
                Ok(())
            }
            TokenKind::InvertedOpen(name) => {
                self.reject_in_parent(token.span, "inverted section")?;
                self.stack.push(Frame::new(FrameKind::Inverted, name, token.span, token.end));
                Ok(())
            }
            TokenKind::ParentOpen(name) => {
                self.reject_in_parent(token.span, "parent include")?;
                self.stack.push(Frame::new(FrameKind::Parent, name, token.span, token.end));
                Ok(())
            }
            TokenKind::BlockOpen(name) => {
                self.stack.push(Frame::new(FrameKind::Block, name, token.span, token.end));
                Ok(())
            }
            TokenKind::SectionClose(name) => self.close(name, token.span, token.start),
            TokenKind::Partial { name, indent } => {
                self.reject_in_parent(token.span, "partial include")?;
                self.push_child(AstNode::Partial { name, indent, span: token.span });
                Ok(())
            }
            TokenKind::Comment | TokenKind::DelimiterChange { .. } => Ok(()),
            TokenKind::Eof => {
                if self.stack.len() > 1 {
                    let open = self.stack.last().expect("non-empty stack");
                    return Err(CompileError::syntax(
                        open.span,
                        format!("section `{}` is never closed", open.name),
                    ));
                }
                Ok(())
            }
        }
    }

    fn close(&mut self, name: String, span: Span, close_start: usize) -> Result<(), CompileError> {
        if !self.stack.last().is_some_and(|f| f.kind != FrameKind::Root) {
            return Err(CompileError::syntax(
                span,
                format!("close tag `{name}` without a matching open tag"),
            ));
        }
        let frame = self.stack.pop().expect("checked above");
        if frame.name != name {
            return Err(CompileError::syntax(
                span,
                format!(
                    "close tag `{name}` does not match `{}` opened at {}",
                    frame.name, frame.span
                ),
            ));
        }

        let node = match frame.kind {
            FrameKind::Section => AstNode::Section {
                path: Path::parse(&frame.name, frame.span),
                children: frame.children,
                raw_body: self.source[frame.body_start..close_start].to_string(),
            },
            FrameKind::Inverted => AstNode::Inverted {
                path: Path::parse(&frame.name, frame.span),
                children: frame.children,
            },
            FrameKind::Parent => AstNode::Parent {
                name: frame.name,
                overrides: frame.overrides,
                span: frame.span,
            },
            FrameKind::Block => {
                // A block closing directly under a parent is an override;
                // anywhere else it is a hole with a default body.
                if self.in_parent_body() {
                    let parent = self.stack.last_mut().expect("parent frame");
                    if parent.overrides.iter().any(|(n, _)| *n == frame.name) {
                        return Err(CompileError::structure(
                            frame.span,
                            format!("duplicate block `{}` in parent `{}`", frame.name, parent.name),
                        ));
                    }
                    parent.overrides.push((frame.name, frame.children));
                    return Ok(());
                }
                AstNode::Block {
                    name: frame.name,
                    children: frame.children,
                    span: frame.span,
                }
            }
            FrameKind::Root => {
                return Err(CompileError::internal("root frame closed"));
            }
        };
        self.push_child(node);
        Ok(())
    }

    fn in_parent_body(&self) -> bool {
        self.stack.last().is_some_and(|f| f.kind == FrameKind::Parent)
    }

    fn reject_in_parent(&self, span: Span, what: &str) -> Result<(), CompileError> {
        if self.in_parent_body() {
            return Err(CompileError::structure(
                span,
                format!("{what} may not appear directly inside a parent section"),
            ));
        }
        Ok(())
    }

    fn push_child(&mut self, node: AstNode) {
        self.stack.last_mut().expect("non-empty stack").children.push(node);
    }
}

/// Parses one template source into its AST.
pub fn parse(source: &str) -> Result<Vec<AstNode>, CompileError> {
    Parser::new(source).parse()
}
