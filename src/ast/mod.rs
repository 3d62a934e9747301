//! Syntax tree model consumed by the query engine.
//!
//! The tree mirrors the cursor model of a C++ front end: every node belongs to
//! one category (declaration, expression, statement, attribute, reference)
//! and carries a fine-grained kind within it. Nodes live in an arena owned by
//! [`Ast`]; everything else refers to them through [`NodeId`].
//!
//! Types live in a separate interned table ([`TypeTable`]), so two types are
//! the same type exactly when their [`TypeId`]s are equal.

mod builder;
mod types;

pub use builder::AstBuilder;
pub use types::{Type, TypeId, TypeTable};

use crate::types::{FileId, Location};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Index of a node inside its [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeclKind {
    TranslationUnit,
    Namespace,
    ClassTemplate,
    CxxRecord,
    ClassTemplateSpecialization,
    Constructor,
    CxxMethod,
    Function,
    FunctionTemplate,
    TemplateTypeParm,
    NonTypeTemplateParm,
    TypeAlias,
    Typedef,
    ParmVar,
    Var,
    Field,
}

/// Statement kinds. Expressions are statements, as in clang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StmtKind {
    CompoundStmt,
    DeclStmt,
    ReturnStmt,
    UnexposedStmt,
    CxxMemberCallExpr,
    CallExpr,
    MemberRefExpr,
    DeclRefExpr,
    IntegerLiteral,
    FloatingLiteral,
    StringLiteral,
    CharacterLiteral,
    BoolLiteral,
    UnexposedExpr,
}

impl StmtKind {
    pub fn is_expression(self) -> bool {
        !matches!(
            self,
            StmtKind::CompoundStmt
                | StmtKind::DeclStmt
                | StmtKind::ReturnStmt
                | StmtKind::UnexposedStmt
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttrKind {
    Deprecated,
    Unexposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RefKind {
    TemplateRef,
    TypeRef,
    NamespaceRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Decl(DeclKind),
    Stmt(StmtKind),
    Attr(AttrKind),
    Ref(RefKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Declaration,
    Expression,
    Statement,
    Attribute,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Access {
    #[default]
    None,
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclData {
    pub kind: DeclKind,
    pub access: Access,
    pub is_invalid: bool,
    pub is_deleted: bool,
    pub has_body: bool,
    /// Parameters only: the declaration supplies a default argument
    pub has_default_arg: bool,
    /// Declared type of variables/parameters, underlying type of aliases,
    /// type-for-decl of template type parameters.
    pub ty: Option<TypeId>,
    /// Template type parameters only
    pub default_type: Option<TypeId>,
    pub template_params: Vec<NodeId>,
    /// Specializations only, one per template parameter
    pub template_args: Vec<TypeId>,
    pub specialized_from: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StmtData {
    pub kind: StmtKind,
    /// Static type of an expression, when known
    pub ty: Option<TypeId>,
    /// Declaration named by a reference expression
    pub referenced: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttrData {
    pub kind: AttrKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefData {
    pub kind: RefKind,
    pub referenced: NodeId,
}

#[derive(Debug, Clone, Serialize)]
pub enum NodeData {
    Decl(DeclData),
    Stmt(StmtData),
    Attr(AttrData),
    Ref(RefData),
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub spelling: String,
    pub location: Location,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Decl(d) => NodeKind::Decl(d.kind),
            NodeData::Stmt(s) => NodeKind::Stmt(s.kind),
            NodeData::Attr(a) => NodeKind::Attr(a.kind),
            NodeData::Ref(r) => NodeKind::Ref(r.kind),
        }
    }

    pub fn category(&self) -> Category {
        match &self.data {
            NodeData::Decl(_) => Category::Declaration,
            NodeData::Stmt(s) if s.kind.is_expression() => Category::Expression,
            NodeData::Stmt(_) => Category::Statement,
            NodeData::Attr(_) => Category::Attribute,
            NodeData::Ref(_) => Category::Reference,
        }
    }

    pub fn as_decl(&self) -> Option<&DeclData> {
        match &self.data {
            NodeData::Decl(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_stmt(&self) -> Option<&StmtData> {
        match &self.data {
            NodeData::Stmt(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ref_data(&self) -> Option<&RefData> {
        match &self.data {
            NodeData::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_decl_kind(&self, kind: DeclKind) -> bool {
        self.as_decl().is_some_and(|d| d.kind == kind)
    }
}

/// An immutable, fully built syntax tree.
#[derive(Debug)]
pub struct Ast {
    nodes: Vec<Node>,
    types: TypeTable,
    files: Vec<PathBuf>,
    root: NodeId,
}

impl Ast {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// First child whose kind is exactly `kind`.
    pub fn first_child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.node(child).kind() == kind)
    }

    pub fn file_id(&self, path: impl AsRef<Path>) -> Option<FileId> {
        let path = path.as_ref();
        self.files
            .iter()
            .position(|f| f == path)
            .and_then(|i| FileId::new(i as u32 + 1))
    }

    pub fn file_path(&self, file: FileId) -> Option<&Path> {
        self.files.get(file.index()).map(PathBuf::as_path)
    }

    /// Clang-style spelling of a type, empty for unknown ids.
    pub fn type_spelling(&self, ty: TypeId) -> &str {
        self.types.spelling(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_category() {
        let file = FileId::new(1).unwrap();
        let node = Node {
            spelling: String::new(),
            location: Location::new(file, 1, 1),
            children: Vec::new(),
            data: NodeData::Stmt(StmtData {
                kind: StmtKind::CxxMemberCallExpr,
                ty: None,
                referenced: None,
            }),
        };
        assert_eq!(node.category(), Category::Expression);
        assert_eq!(node.kind(), NodeKind::Stmt(StmtKind::CxxMemberCallExpr));

        assert!(!StmtKind::CompoundStmt.is_expression());
        assert!(StmtKind::DeclRefExpr.is_expression());
    }

    #[test]
    fn test_file_lookup() {
        let mut builder = AstBuilder::new("main.cpp");
        let header = builder.add_file("widget.h");
        let ast = builder.finish();

        assert_eq!(ast.file_id("widget.h"), Some(header));
        assert_eq!(ast.file_path(header), Some(Path::new("widget.h")));
        assert!(ast.file_id("other.cpp").is_none());
        assert!(ast.node(ast.root()).is_decl_kind(DeclKind::TranslationUnit));
    }
}
