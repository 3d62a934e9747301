//! Kind-keyed handler tables.
//!
//! Three independent families map a node kind to the [`Visitor`] hook that
//! handles it. The standard registry is assembled once from static tables and
//! shared by every traversal.

use super::Visitor;
use crate::ast::{Ast, AttrKind, DeclKind, Node, NodeData, NodeId, StmtKind};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Dispatch function stored in the registry.
pub type Handler = fn(&mut dyn Visitor, &Ast, NodeId);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate {family} handler for {kind}")]
    Duplicate { family: &'static str, kind: String },
}

const STATEMENT_HANDLERS: &[(StmtKind, Handler)] = &[
    (StmtKind::CxxMemberCallExpr, dispatch_member_call_expr),
    (StmtKind::CallExpr, dispatch_call_expr),
];

const DECLARATION_HANDLERS: &[(DeclKind, Handler)] = &[
    (DeclKind::ClassTemplate, dispatch_class_template),
    (DeclKind::Constructor, dispatch_constructor),
    (DeclKind::FunctionTemplate, dispatch_function_template),
    (DeclKind::TypeAlias, dispatch_type_alias),
    (DeclKind::Typedef, dispatch_type_alias),
];

const ATTRIBUTE_HANDLERS: &[(AttrKind, Handler)] = &[
    (AttrKind::Deprecated, dispatch_annotation),
    (AttrKind::Unexposed, dispatch_annotation),
];

fn dispatch_member_call_expr(visitor: &mut dyn Visitor, ast: &Ast, node: NodeId) {
    visitor.visit_member_call_expr(ast, node);
}

fn dispatch_call_expr(visitor: &mut dyn Visitor, ast: &Ast, node: NodeId) {
    visitor.visit_call_expr(ast, node);
}

fn dispatch_class_template(visitor: &mut dyn Visitor, ast: &Ast, node: NodeId) {
    visitor.visit_class_template(ast, node);
}

fn dispatch_constructor(visitor: &mut dyn Visitor, ast: &Ast, node: NodeId) {
    visitor.visit_constructor(ast, node);
}

fn dispatch_function_template(visitor: &mut dyn Visitor, ast: &Ast, node: NodeId) {
    visitor.visit_function_template(ast, node);
}

fn dispatch_type_alias(visitor: &mut dyn Visitor, ast: &Ast, node: NodeId) {
    visitor.visit_type_alias(ast, node);
}

fn dispatch_annotation(visitor: &mut dyn Visitor, ast: &Ast, node: NodeId) {
    visitor.visit_annotation(ast, node);
}

#[derive(Default)]
pub struct HandlerRegistry {
    statements: HashMap<StmtKind, Handler>,
    declarations: HashMap<DeclKind, Handler>,
    attributes: HashMap<AttrKind, Handler>,
}

impl HandlerRegistry {
    /// The registry built from the crate's handler tables.
    pub fn standard() -> &'static HandlerRegistry {
        static STANDARD: OnceLock<HandlerRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            Self::from_tables(STATEMENT_HANDLERS, DECLARATION_HANDLERS, ATTRIBUTE_HANDLERS)
                .unwrap_or_else(|e| {
                    tracing::error!("[walker] handler tables rejected: {e}");
                    Self::default()
                })
        })
    }

    pub fn from_tables(
        statements: &[(StmtKind, Handler)],
        declarations: &[(DeclKind, Handler)],
        attributes: &[(AttrKind, Handler)],
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for &(kind, handler) in statements {
            registry.register_statement(kind, handler)?;
        }
        for &(kind, handler) in declarations {
            registry.register_declaration(kind, handler)?;
        }
        for &(kind, handler) in attributes {
            registry.register_attribute(kind, handler)?;
        }
        Ok(registry)
    }

    pub fn register_statement(&mut self, kind: StmtKind, handler: Handler) -> Result<(), RegistryError> {
        insert_unique(&mut self.statements, "statement", kind, handler)
    }

    pub fn register_declaration(&mut self, kind: DeclKind, handler: Handler) -> Result<(), RegistryError> {
        insert_unique(&mut self.declarations, "declaration", kind, handler)
    }

    pub fn register_attribute(&mut self, kind: AttrKind, handler: Handler) -> Result<(), RegistryError> {
        insert_unique(&mut self.attributes, "attribute", kind, handler)
    }

    /// Handler for `node`, selected by its runtime category.
    pub fn handler_for(&self, node: &Node) -> Option<Handler> {
        match &node.data {
            NodeData::Decl(d) => self.declarations.get(&d.kind).copied(),
            NodeData::Stmt(s) => self.statements.get(&s.kind).copied(),
            NodeData::Attr(a) => self.attributes.get(&a.kind).copied(),
            NodeData::Ref(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.statements.len() + self.declarations.len() + self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn insert_unique<K>(
    table: &mut HashMap<K, Handler>,
    family: &'static str,
    kind: K,
    handler: Handler,
) -> Result<(), RegistryError>
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
{
    if table.contains_key(&kind) {
        return Err(RegistryError::Duplicate {
            family,
            kind: format!("{kind:?}"),
        });
    }
    table.insert(kind, handler);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_is_complete() {
        let registry = HandlerRegistry::standard();
        assert_eq!(
            registry.len(),
            STATEMENT_HANDLERS.len() + DECLARATION_HANDLERS.len() + ATTRIBUTE_HANDLERS.len()
        );
    }

    #[test]
    fn test_duplicate_kind_is_rejected() {
        let result = HandlerRegistry::from_tables(
            &[
                (StmtKind::CallExpr, dispatch_call_expr),
                (StmtKind::CallExpr, dispatch_member_call_expr),
            ],
            &[],
            &[],
        );
        assert_eq!(
            result.err(),
            Some(RegistryError::Duplicate {
                family: "statement",
                kind: "CallExpr".to_string(),
            })
        );
    }

    #[test]
    fn test_same_kind_in_different_families() {
        let registry = HandlerRegistry::from_tables(
            &[(StmtKind::CallExpr, dispatch_call_expr)],
            &[(DeclKind::Constructor, dispatch_constructor)],
            &[(AttrKind::Deprecated, dispatch_annotation)],
        )
        .unwrap();
        assert_eq!(registry.len(), 3);
    }
}
