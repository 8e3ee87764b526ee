//! The context-stack type resolver.
//!
//! Walks the loaded AST in pre-order over a stack of typed context frames
//! (frame 0 is the model) and binds every dotted name to a concrete accessor
//! chain. Head segments search the stack top-down and never fall through
//! after the first hit; later segments resolve against the current result
//! type only. The output IR mirrors the section classifications: loop,
//! truthiness gate, presence gate, scope, or lambda.

use crate::compiler::ast::{AstNode, Path};
use crate::compiler::diagnostics::CompileError;
use crate::compiler::ir::{IrNode, IterMeta, ResolvedExpr, ScopeEntry, Step};
use crate::descriptor::{AccessorKind, LambdaArg, TypeRef, TypeShape};

struct Frame {
    ty: TypeRef,
    /// True for frames opened by a loop section; only those carry the
    /// `-first`/`-last`/`-index` pseudo-members.
    iteration: bool,
}

pub struct Resolver {
    frames: Vec<Frame>,
}

impl Resolver {
    pub fn new(model: TypeRef) -> Self {
        Self {
            frames: vec![Frame { ty: model, iteration: false }],
        }
    }

    /// Resolves a loaded template body against the model type.
    pub fn resolve(mut self, nodes: &[AstNode]) -> Result<Vec<IrNode>, CompileError> {
        self.resolve_nodes(nodes)
    }

    fn resolve_nodes(&mut self, nodes: &[AstNode]) -> Result<Vec<IrNode>, CompileError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                AstNode::Text { literal, .. } => out.push(IrNode::Text(literal.clone())),
                AstNode::Var { path, escaped } => out.push(self.resolve_var(path, *escaped)?),
                AstNode::Section { path, children, raw_body } => {
                    out.push(self.resolve_section(path, children, raw_body)?);
                }
                AstNode::Inverted { path, children } => {
                    out.push(self.resolve_inverted(path, children)?);
                }
                AstNode::Partial { span, .. } | AstNode::Parent { span, .. } | AstNode::Block { span, .. } => {
                    return Err(CompileError::internal(format!(
                        "unresolved include reached the resolver at {span}"
                    )));
                }
            }
        }
        Ok(out)
    }

    fn resolve_var(&mut self, path: &Path, escaped: bool) -> Result<IrNode, CompileError> {
        if path.is_context() {
            return Ok(IrNode::ContextVar {
                keys: path.segments[1..].to_vec(),
                escaped,
            });
        }
        let expr = self.resolve_path(path)?;
        let ok = match expr.terminal.shape() {
            TypeShape::Lambda(shape) => {
                shape.arg == LambdaArg::None && shape.result.is_formattable()
            }
            _ => expr.terminal.is_formattable(),
        };
        if !ok {
            return Err(CompileError::resolve(
                path.span,
                format!(
                    "`{}` has type `{}`, which cannot be interpolated",
                    path.dotted(),
                    expr.terminal
                ),
            ));
        }
        Ok(IrNode::Var { expr, escaped })
    }

    fn resolve_section(
        &mut self,
        path: &Path,
        children: &[AstNode],
        raw_body: &str,
    ) -> Result<IrNode, CompileError> {
        if path.is_context() {
            return Err(CompileError::resolve(
                path.span,
                "the ambient context is only available in variable position",
            ));
        }
        let expr = self.resolve_path(path)?;
        match expr.terminal.shape().clone() {
            TypeShape::Iterable(element) | TypeShape::Array(element) => {
                self.frames.push(Frame { ty: element, iteration: true });
                let body = self.resolve_nodes(children)?;
                self.frames.pop();
                Ok(IrNode::Loop { expr, body })
            }
            TypeShape::Boolean => {
                let body = self.resolve_nodes(children)?;
                Ok(IrNode::Gate { expr, body })
            }
            TypeShape::Nullable(inner) => {
                self.frames.push(Frame { ty: inner, iteration: false });
                let body = self.resolve_nodes(children)?;
                self.frames.pop();
                Ok(IrNode::Presence { expr, body })
            }
            TypeShape::Record | TypeShape::Map(_) => {
                self.frames.push(Frame { ty: expr.terminal.clone(), iteration: false });
                let body = self.resolve_nodes(children)?;
                self.frames.pop();
                Ok(IrNode::Scope { expr, body })
            }
            TypeShape::Lambda(shape) => {
                match (&shape.arg, shape.result.shape()) {
                    (LambdaArg::None | LambdaArg::Element, TypeShape::Record) => {
                        self.frames.push(Frame { ty: shape.result.clone(), iteration: false });
                        let body = self.resolve_nodes(children)?;
                        self.frames.pop();
                        Ok(IrNode::LambdaScope { expr, body })
                    }
                    (LambdaArg::RawBody | LambdaArg::RawBodyAndElement, TypeShape::Text) => {
                        Ok(IrNode::LambdaRaw {
                            expr,
                            raw_body: raw_body.to_string(),
                            scope: self.scope_entries(),
                        })
                    }
                    _ => Err(CompileError::resolve(
                        path.span,
                        format!(
                            "lambda `{}` has an unsupported shape for a section",
                            path.dotted()
                        ),
                    )),
                }
            }
            TypeShape::Numeric | TypeShape::Text => Err(CompileError::resolve(
                path.span,
                format!(
                    "`{}` has type `{}`, which cannot open a section",
                    path.dotted(),
                    expr.terminal
                ),
            )),
        }
    }

    fn resolve_inverted(
        &mut self,
        path: &Path,
        children: &[AstNode],
    ) -> Result<IrNode, CompileError> {
        if path.is_context() {
            return Err(CompileError::resolve(
                path.span,
                "the ambient context is only available in variable position",
            ));
        }
        let expr = self.resolve_path(path)?;
        let invertible = matches!(
            expr.terminal.shape(),
            TypeShape::Boolean | TypeShape::Nullable(_) | TypeShape::Iterable(_) | TypeShape::Array(_)
        ) || expr.is_fallible();
        if !invertible {
            // Records and maps are always truthy here (empty map included),
            // so an inverted section over them could never render.
            return Err(CompileError::resolve(
                path.span,
                format!(
                    "`{}` has type `{}`, which is never falsy in an inverted section",
                    path.dotted(),
                    expr.terminal
                ),
            ));
        }
        // The body sees the unchanged frame.
        let body = self.resolve_nodes(children)?;
        Ok(IrNode::Inverted { expr, body })
    }

    /// The names a lambda's re-rendered output can resolve: every
    /// formattable member reachable from the context stack, with nested
    /// records expanded into dotted names up to a fixed depth. Frames are
    /// walked bottom-up so inner frames shadow outer ones on insertion.
    /// Iterables, maps, and lambdas stay out of the dynamic scope.
    fn scope_entries(&self) -> Vec<ScopeEntry> {
        const MAX_NESTING: usize = 3;
        let mut entries = Vec::new();
        for (index, frame) in self.frames.iter().enumerate() {
            Self::collect_scope(
                index,
                &frame.ty,
                &mut Vec::new(),
                &mut Vec::new(),
                MAX_NESTING,
                &mut entries,
            );
        }
        entries
    }

    fn collect_scope(
        frame: usize,
        ty: &TypeRef,
        names: &mut Vec<String>,
        steps: &mut Vec<Step>,
        depth: usize,
        out: &mut Vec<ScopeEntry>,
    ) {
        for member in ty.members() {
            let step = match member.accessor {
                AccessorKind::Field => Step::Field(member.name.clone()),
                AccessorKind::Method => Step::Method(member.name.clone()),
            };
            names.push(member.name.clone());
            steps.push(step);
            match member.ty.shape() {
                TypeShape::Record => {
                    if depth > 0 {
                        Self::collect_scope(frame, &member.ty, names, steps, depth - 1, out);
                    }
                }
                _ => {
                    if member.ty.is_formattable() {
                        out.push(ScopeEntry {
                            path: names.clone(),
                            expr: ResolvedExpr {
                                frame,
                                steps: steps.clone(),
                                meta: None,
                                terminal: member.ty.clone(),
                            },
                        });
                    }
                }
            }
            names.pop();
            steps.pop();
        }
    }

    /// Binds `a.b.c` at the current stack: the head searches frames
    /// top-down, every later segment resolves against the previous result
    /// type only.
    fn resolve_path(&self, path: &Path) -> Result<ResolvedExpr, CompileError> {
        let head = path.segments[0].as_str();

        if path.is_self() {
            let frame = self.frames.len() - 1;
            return Ok(ResolvedExpr {
                frame,
                steps: Vec::new(),
                meta: None,
                terminal: self.frames[frame].ty.clone(),
            });
        }

        if let Some(meta) = iter_meta(head) {
            if path.segments.len() > 1 {
                return Err(CompileError::resolve(
                    path.span,
                    format!("`{head}` does not have members"),
                ));
            }
            let Some(frame) = self.frames.iter().rposition(|f| f.iteration) else {
                return Err(CompileError::resolve(
                    path.span,
                    format!("`{head}` is only available inside a list section"),
                ));
            };
            let terminal = match meta {
                IterMeta::First | IterMeta::Last => crate::descriptor::TypeDescriptor::boolean(),
                IterMeta::Index => crate::descriptor::TypeDescriptor::numeric("usize"),
            };
            return Ok(ResolvedExpr { frame, steps: Vec::new(), meta: Some(meta), terminal });
        }

        let Some((frame, mut steps, mut current)) = self.bind_head(head) else {
            return Err(CompileError::resolve(
                path.span,
                format!(
                    "name `{head}` is not a member of any enclosing type (innermost: `{}`)",
                    self.frames.last().expect("non-empty stack").ty
                ),
            ));
        };

        for segment in &path.segments[1..] {
            let (step, next) = self.bind_segment(segment, &current).ok_or_else(|| {
                CompileError::resolve(
                    path.span,
                    format!("type `{current}` has no member `{segment}`"),
                )
            })?;
            steps.push(step);
            current = next;
        }

        Ok(ResolvedExpr { frame, steps, meta: None, terminal: current })
    }

    fn bind_head(&self, head: &str) -> Option<(usize, Vec<Step>, TypeRef)> {
        for (index, frame) in self.frames.iter().enumerate().rev() {
            if let Some((step, ty)) = self.bind_segment(head, &frame.ty) {
                return Some((index, vec![step], ty));
            }
        }
        None
    }

    fn bind_segment(&self, name: &str, ty: &TypeRef) -> Option<(Step, TypeRef)> {
        match ty.shape() {
            TypeShape::Record => {
                let member = ty.member(name)?;
                let step = match member.accessor {
                    AccessorKind::Field => Step::Field(name.to_string()),
                    AccessorKind::Method => Step::Method(name.to_string()),
                };
                Some((step, member.ty.clone()))
            }
            TypeShape::Map(value) => Some((Step::MapKey(name.to_string()), value.clone())),
            // Nullable values must be unwrapped by a section before their
            // members are reachable; everything else has no members.
            _ => None,
        }
    }
}

fn iter_meta(name: &str) -> Option<IterMeta> {
    match name {
        "-first" => Some(IterMeta::First),
        "-last" => Some(IterMeta::Last),
        "-index" => Some(IterMeta::Index),
        _ => None,
    }
}

/// Resolves a loaded template body against the model descriptor.
pub fn resolve(nodes: &[AstNode], model: TypeRef) -> Result<Vec<IrNode>, CompileError> {
    Resolver::new(model).resolve(nodes)
}
