//! Depth-first tree walker with kind-keyed dispatch.
//!
//! A [`Walker`] visits every node reachable from the root once. For each
//! node it first asks the visitor whether to enter it at all, then walks the
//! children, then hands the node to the handler registered for its kind.
//! Reference nodes are followed into their target as if the target were a
//! child; a per-traversal visited set keeps reference cycles finite.
//!
//! Domain logic plugs in by implementing [`Visitor`].

mod filter;
mod registry;

pub use filter::FileFilter;
pub use registry::{Handler, HandlerRegistry, RegistryError};

use crate::ast::{Ast, NodeId};
use std::collections::HashSet;

/// Nodes deeper than this are skipped.
pub const MAX_WALK_DEPTH: usize = 512;

/// Hooks invoked by the [`Walker`]. Every hook defaults to doing nothing.
pub trait Visitor {
    /// Whether to enter `node` and its subtree.
    fn should_visit(&self, _ast: &Ast, _node: NodeId) -> bool {
        true
    }

    fn visit_member_call_expr(&mut self, _ast: &Ast, _node: NodeId) {}

    fn visit_call_expr(&mut self, _ast: &Ast, _node: NodeId) {}

    fn visit_class_template(&mut self, _ast: &Ast, _node: NodeId) {}

    fn visit_constructor(&mut self, _ast: &Ast, _node: NodeId) {}

    fn visit_function_template(&mut self, _ast: &Ast, _node: NodeId) {}

    /// `using X = T;` and `typedef T X;`
    fn visit_type_alias(&mut self, _ast: &Ast, _node: NodeId) {}

    fn visit_annotation(&mut self, _ast: &Ast, _node: NodeId) {}
}

pub struct Walker<'a> {
    ast: &'a Ast,
    registry: &'a HandlerRegistry,
    visited: HashSet<NodeId>,
}

impl<'a> Walker<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self::with_registry(ast, HandlerRegistry::standard())
    }

    pub fn with_registry(ast: &'a Ast, registry: &'a HandlerRegistry) -> Self {
        Self {
            ast,
            registry,
            visited: HashSet::new(),
        }
    }

    /// Walk the declarations of the translation unit.
    pub fn walk(&mut self, visitor: &mut dyn Visitor) {
        let root = self.ast.root();
        self.visited.insert(root);
        for &child in self.ast.children(root) {
            self.visit(child, visitor, true, 0);
        }
    }

    /// Walk the subtree rooted at `node`, `node` included.
    pub fn walk_from(&mut self, node: NodeId, visitor: &mut dyn Visitor) {
        self.visit(node, visitor, true, 0);
    }

    /// Number of distinct nodes entered so far.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn has_visited(&self, node: NodeId) -> bool {
        self.visited.contains(&node)
    }

    fn visit(&mut self, node: NodeId, visitor: &mut dyn Visitor, filtered: bool, depth: usize) {
        if depth > MAX_WALK_DEPTH {
            tracing::warn!("[walker] maximum depth {MAX_WALK_DEPTH} exceeded, skipping subtree");
            return;
        }
        if self.visited.contains(&node) {
            return;
        }
        let ast = self.ast;
        let Some(current) = ast.get(node) else {
            return;
        };
        if filtered && !visitor.should_visit(ast, node) {
            return;
        }
        self.visited.insert(node);

        if let Some(reference) = current.as_ref_data() {
            self.visit(reference.referenced, visitor, false, depth + 1);
        }
        for &child in &current.children {
            self.visit(child, visitor, filtered, depth + 1);
        }

        if let Some(handler) = self.registry.handler_for(current) {
            handler(visitor, ast, node);
        }
    }
}
