//! Resolution of an `emplace`/`emplace_back` call to the element type's
//! constructors.
//!
//! Each step either yields the input of the next one or reports why the call
//! does not qualify. A non-qualifying call is not an error: the visitor logs
//! the reason and keeps walking.

use super::effective::{EffectiveConstructor, Parameter, effective_constructors};
use crate::ast::{Access, Ast, DeclKind, NodeId, NodeKind, RefKind, StmtKind};
use crate::debug_event;
use crate::types::FileId;
use crate::walker::{FileFilter, Visitor, Walker};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Member names that trigger constructor lookup.
pub const EMPLACE_METHODS: &[&str] = &["emplace", "emplace_back"];

/// Name of the alias exposing a container's element type.
pub const VALUE_TYPE_ALIAS: &str = "value_type";

/// How `value_type` is matched against the container's template parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// The parameter's type-for-decl is the alias's underlying type.
    #[default]
    TypeIdentity,
    /// The alias's single reference child names the parameter declaration.
    DeclarationIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// Only offer public constructors.
    pub check_access: bool,
    pub identity: IdentityPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            check_access: true,
            identity: IdentityPolicy::TypeIdentity,
        }
    }
}

impl ResolverOptions {
    /// No access filtering, declaration-identity matching.
    pub fn lenient() -> Self {
        Self {
            check_access: false,
            identity: IdentityPolicy::DeclarationIdentity,
        }
    }
}

/// File and zero-based line of the call being typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTarget {
    pub file: FileId,
    pub line: u32,
}

impl QueryTarget {
    pub fn new(file: FileId, line: u32) -> Self {
        Self { file, line }
    }

    /// Target from an editor's one-based line number.
    pub fn from_one_based(file: FileId, line: u32) -> Option<Self> {
        line.checked_sub(1).map(|line| Self { file, line })
    }
}

/// Why a member call produced no candidates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unqualified {
    #[error("call is not on the target line")]
    OffTarget,

    #[error("call has no member reference")]
    NoMemberReference,

    #[error("member `{0}` is not an emplace method")]
    NotEmplace(String),

    #[error("member reference has no receiver")]
    NoReceiver,

    #[error("receiver is not declared with a class template")]
    NoClassTemplate,

    #[error("class template `{0}` has no value_type alias")]
    NoValueType(String),

    #[error("value_type of `{0}` is not one of its template parameters")]
    ValueTypeNotParameter(String),

    #[error("receiver type is not a class template specialization")]
    NoSpecialization,

    #[error("specialization has no template argument at index {0}")]
    MissingArgument(usize),

    #[error("element type `{0}` is not a record")]
    NonRecordElement(String),
}

/// A call that passed every resolution step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    /// `emplace` or `emplace_back`
    pub method: String,
    pub container: NodeId,
    pub specialization: NodeId,
    pub element_index: usize,
    /// Record declaration of the element type
    pub element: NodeId,
}

/// Run the resolution chain on one member call expression.
pub fn resolve_call(
    ast: &Ast,
    call: NodeId,
    target: &QueryTarget,
    options: &ResolverOptions,
) -> Result<ResolvedCall, Unqualified> {
    check_location(ast, call, target)?;
    let member = member_reference(ast, call)?;
    let method = emplace_method(ast, member)?;
    let receiver = receiver(ast, member)?;
    let container = class_template(ast, receiver)?;
    let value_type = value_type_alias(ast, container)?;
    let element_index = element_index(ast, container, value_type, options.identity)?;
    let specialization = receiver_specialization(ast, receiver)?;
    let element = element_record(ast, specialization, element_index)?;

    Ok(ResolvedCall {
        method,
        container,
        specialization,
        element_index,
        element,
    })
}

/// Every effective constructor of the resolved element type, ordinary
/// constructors first, then constructor templates.
pub fn element_constructors(
    ast: &Ast,
    call: &ResolvedCall,
    options: &ResolverOptions,
) -> Vec<EffectiveConstructor> {
    let element = ast.node(call.element);
    let mut found = Vec::new();

    for &child in &element.children {
        let node = ast.node(child);
        if node.is_decl_kind(DeclKind::Constructor) && is_offered(ast, child, options) {
            found.extend(effective_constructors(&call.method, &parameters(ast, child)));
        }
    }

    for &child in &element.children {
        let node = ast.node(child);
        if node.is_decl_kind(DeclKind::FunctionTemplate)
            && node.spelling == element.spelling
            && is_offered(ast, child, options)
        {
            let name = template_display_name(ast, &call.method, child);
            found.extend(effective_constructors(&name, &parameters(ast, child)));
        }
    }

    found
}

/// Walk `ast` and collect the candidates for the call at `target`.
pub fn find_emplace_constructors(
    ast: &Ast,
    target: QueryTarget,
    options: ResolverOptions,
) -> Vec<EffectiveConstructor> {
    let mut visitor = EmplaceVisitor::new(target, options);
    Walker::new(ast).walk(&mut visitor);
    visitor.into_constructors()
}

/// Walker hook that resolves qualifying member calls.
pub struct EmplaceVisitor {
    target: QueryTarget,
    filter: FileFilter,
    options: ResolverOptions,
    found: Vec<EffectiveConstructor>,
}

impl EmplaceVisitor {
    pub fn new(target: QueryTarget, options: ResolverOptions) -> Self {
        Self {
            target,
            filter: FileFilter::new(target.file),
            options,
            found: Vec::new(),
        }
    }

    pub fn constructors(&self) -> &[EffectiveConstructor] {
        &self.found
    }

    pub fn into_constructors(self) -> Vec<EffectiveConstructor> {
        self.found
    }
}

impl Visitor for EmplaceVisitor {
    fn should_visit(&self, ast: &Ast, node: NodeId) -> bool {
        self.filter.accepts(ast, node)
    }

    fn visit_member_call_expr(&mut self, ast: &Ast, node: NodeId) {
        match resolve_call(ast, node, &self.target, &self.options) {
            Ok(call) => {
                let before = self.found.len();
                self.found
                    .extend(element_constructors(ast, &call, &self.options));
                debug_event!(
                    "emplace",
                    "resolved",
                    "{} on line {} -> {} candidates",
                    call.method,
                    self.target.line + 1,
                    self.found.len() - before
                );
            }
            Err(Unqualified::OffTarget) => {}
            Err(reason @ Unqualified::NonRecordElement(_)) => {
                debug_event!("emplace", "builtin element", "{reason}");
            }
            Err(reason) => {
                tracing::trace!("[emplace] skipped call: {reason}");
            }
        }
    }
}

fn check_location(ast: &Ast, call: NodeId, target: &QueryTarget) -> Result<(), Unqualified> {
    let location = ast.node(call).location;
    if location.file == target.file && location.line.checked_sub(1) == Some(target.line) {
        Ok(())
    } else {
        Err(Unqualified::OffTarget)
    }
}

fn member_reference(ast: &Ast, call: NodeId) -> Result<NodeId, Unqualified> {
    ast.first_child_of_kind(call, NodeKind::Stmt(StmtKind::MemberRefExpr))
        .ok_or(Unqualified::NoMemberReference)
}

fn emplace_method(ast: &Ast, member: NodeId) -> Result<String, Unqualified> {
    let spelling = &ast.node(member).spelling;
    if EMPLACE_METHODS.contains(&spelling.as_str()) {
        Ok(spelling.clone())
    } else {
        Err(Unqualified::NotEmplace(spelling.clone()))
    }
}

fn receiver(ast: &Ast, member: NodeId) -> Result<NodeId, Unqualified> {
    ast.first_child_of_kind(member, NodeKind::Stmt(StmtKind::DeclRefExpr))
        .ok_or(Unqualified::NoReceiver)
}

fn class_template(ast: &Ast, receiver: NodeId) -> Result<NodeId, Unqualified> {
    let entity = ast
        .node(receiver)
        .as_stmt()
        .and_then(|s| s.referenced)
        .ok_or(Unqualified::NoClassTemplate)?;
    let template_ref = ast
        .first_child_of_kind(entity, NodeKind::Ref(RefKind::TemplateRef))
        .ok_or(Unqualified::NoClassTemplate)?;
    let template = ast
        .node(template_ref)
        .as_ref_data()
        .map(|r| r.referenced)
        .ok_or(Unqualified::NoClassTemplate)?;

    if ast.node(template).is_decl_kind(DeclKind::ClassTemplate) {
        Ok(template)
    } else {
        Err(Unqualified::NoClassTemplate)
    }
}

fn value_type_alias(ast: &Ast, template: NodeId) -> Result<NodeId, Unqualified> {
    ast.children(template)
        .iter()
        .copied()
        .find(|&child| {
            let node = ast.node(child);
            (node.is_decl_kind(DeclKind::TypeAlias) || node.is_decl_kind(DeclKind::Typedef))
                && node.spelling == VALUE_TYPE_ALIAS
        })
        .ok_or_else(|| Unqualified::NoValueType(ast.node(template).spelling.clone()))
}

fn element_index(
    ast: &Ast,
    template: NodeId,
    alias: NodeId,
    identity: IdentityPolicy,
) -> Result<usize, Unqualified> {
    let params = ast
        .node(template)
        .as_decl()
        .map(|d| d.template_params.as_slice())
        .unwrap_or_default();

    let index = match identity {
        IdentityPolicy::TypeIdentity => {
            let underlying = ast.node(alias).as_decl().and_then(|d| d.ty);
            underlying.and_then(|ty| {
                params.iter().position(|&param| {
                    ast.node(param)
                        .as_decl()
                        .is_some_and(|d| d.kind == DeclKind::TemplateTypeParm && d.ty == Some(ty))
                })
            })
        }
        IdentityPolicy::DeclarationIdentity => match ast.children(alias) {
            [only] => ast
                .node(*only)
                .as_ref_data()
                .and_then(|r| params.iter().position(|&param| param == r.referenced)),
            _ => None,
        },
    };

    index.ok_or_else(|| Unqualified::ValueTypeNotParameter(ast.node(template).spelling.clone()))
}

fn receiver_specialization(ast: &Ast, receiver: NodeId) -> Result<NodeId, Unqualified> {
    let types = ast.types();
    let static_type = ast
        .node(receiver)
        .as_stmt()
        .and_then(|s| s.ty)
        .ok_or(Unqualified::NoSpecialization)?;
    let written = types
        .template_specialization(static_type)
        .ok_or(Unqualified::NoSpecialization)?;
    let record = types
        .record_decl(types.canonical(written))
        .ok_or(Unqualified::NoSpecialization)?;

    if ast
        .node(record)
        .is_decl_kind(DeclKind::ClassTemplateSpecialization)
    {
        Ok(record)
    } else {
        Err(Unqualified::NoSpecialization)
    }
}

fn element_record(ast: &Ast, specialization: NodeId, index: usize) -> Result<NodeId, Unqualified> {
    let types = ast.types();
    let argument = ast
        .node(specialization)
        .as_decl()
        .and_then(|d| d.template_args.get(index).copied())
        .ok_or(Unqualified::MissingArgument(index))?;
    let canonical = types.canonical(argument);

    types
        .record_decl(canonical)
        .ok_or_else(|| Unqualified::NonRecordElement(types.spelling(canonical).to_string()))
}

fn is_offered(ast: &Ast, decl: NodeId, options: &ResolverOptions) -> bool {
    let Some(data) = ast.node(decl).as_decl() else {
        return false;
    };
    if data.is_invalid || data.is_deleted {
        return false;
    }
    // TODO: friend containers can reach non-public constructors too
    !options.check_access || data.access == Access::Public
}

fn parameters(ast: &Ast, function: NodeId) -> Vec<Parameter> {
    ast.children(function)
        .iter()
        .filter_map(|&child| {
            let node = ast.node(child);
            let decl = node.as_decl().filter(|d| d.kind == DeclKind::ParmVar)?;
            let ty = decl
                .ty
                .map(|t| ast.type_spelling(t).to_string())
                .unwrap_or_default();
            Some(Parameter::new(ty, node.spelling.clone(), decl.has_default_arg))
        })
        .collect()
}

/// `emplace_back<T, U>` for a constructor template with parameters `T, U`.
fn template_display_name(ast: &Ast, method: &str, template: NodeId) -> String {
    let params: Vec<&str> = ast
        .node(template)
        .as_decl()
        .map(|d| {
            d.template_params
                .iter()
                .map(|&p| ast.node(p).spelling.as_str())
                .collect()
        })
        .unwrap_or_default();

    if params.is_empty() {
        method.to_string()
    } else {
        format!("{method}<{}>", params.join(", "))
    }
}
