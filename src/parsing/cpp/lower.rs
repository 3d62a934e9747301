//! Lowering of tree-sitter C++ syntax into the query AST.
//!
//! Lowering is a single pass in source order. Names are resolved against a
//! stack of lexical scopes as declarations are encountered, so a name used
//! before its declaration stays unresolved and becomes an unexposed type.
//! Quoted includes found next to the including file or in an include
//! directory are lowered in place, each under its own file identity.

use crate::ast::{
    Access, Ast, AstBuilder, AttrKind, DeclKind, NodeId, RefKind, StmtKind, Type, TypeId,
};
use crate::debug_event;
use crate::parsing::Diagnostic;
use crate::types::{FileId, Location};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

const MAX_INCLUDE_DEPTH: usize = 32;

/// One file being lowered.
struct Source<'s> {
    code: &'s str,
    file: FileId,
    dir: Option<PathBuf>,
    depth: usize,
}

impl<'s> Source<'s> {
    fn text(&self, node: Node) -> &'s str {
        &self.code[node.byte_range()]
    }

    fn location(&self, node: Node) -> Location {
        let point = node.start_position();
        Location::new(self.file, point.row as u32 + 1, point.column as u32 + 1)
    }
}

#[derive(Default)]
struct Scope {
    /// Namespace or class whose member table receives declarations
    owner: Option<NodeId>,
    names: HashMap<String, NodeId>,
}

pub(super) struct Lowerer<'p> {
    builder: AstBuilder,
    parser: &'p mut Parser,
    include_dirs: Vec<PathBuf>,
    included: HashSet<PathBuf>,
    scopes: Vec<Scope>,
    members: HashMap<NodeId, HashMap<String, NodeId>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'p> Lowerer<'p> {
    pub(super) fn new(builder: AstBuilder, parser: &'p mut Parser, include_dirs: Vec<PathBuf>) -> Self {
        let root = builder.root();
        Self {
            builder,
            parser,
            include_dirs,
            included: HashSet::new(),
            scopes: vec![Scope {
                owner: Some(root),
                names: HashMap::new(),
            }],
            members: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(super) fn lower_main(&mut self, tree: &Tree, code: &str, path: &Path) {
        self.included.insert(path.to_path_buf());
        let src = Source {
            code,
            file: self.builder.main_file(),
            dir: path.parent().map(Path::to_path_buf),
            depth: 0,
        };
        let root = tree.root_node();
        self.collect_diagnostics(root, &src);
        self.lower_items(self.builder.root(), root, &src);
    }

    pub(super) fn finish(self) -> (Ast, Vec<Diagnostic>) {
        (self.builder.finish(), self.diagnostics)
    }

    fn collect_diagnostics(&mut self, root: Node, src: &Source) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_missing() {
                self.diagnostics.push(Diagnostic {
                    location: src.location(node),
                    message: format!("missing `{}`", node.kind()),
                });
            } else if node.is_error() {
                self.diagnostics.push(Diagnostic {
                    location: src.location(node),
                    message: "syntax error".to_string(),
                });
            }
            if node.has_error() {
                let children: Vec<Node> = node.children(&mut node.walk()).collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }

    // Scopes

    fn push_scope(&mut self, owner: Option<NodeId>) {
        let names = owner
            .and_then(|o| self.members.get(&o))
            .cloned()
            .unwrap_or_default();
        self.scopes.push(Scope { owner, names });
    }

    fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn declare(&mut self, name: &str, decl: NodeId) {
        if name.is_empty() {
            return;
        }
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        scope.names.insert(name.to_string(), decl);
        if let Some(owner) = scope.owner {
            self.members
                .entry(owner)
                .or_default()
                .insert(name.to_string(), decl);
        }
    }

    fn lookup(&self, name: &str) -> Option<NodeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name).copied())
    }

    fn lookup_local(&self, name: &str) -> Option<NodeId> {
        self.scopes.last().and_then(|s| s.names.get(name).copied())
    }

    /// Resolve a possibly qualified name to its declaration.
    fn resolve_name(&self, node: Node, src: &Source, within: Option<NodeId>) -> Option<NodeId> {
        match node.kind() {
            "qualified_identifier" => {
                let scope = match node.child_by_field_name("scope") {
                    Some(scope) => self.resolve_name(scope, src, within)?,
                    None => self.builder.root(),
                };
                let name = node.child_by_field_name("name")?;
                self.resolve_name(name, src, Some(scope))
            }
            "template_type" | "template_function" => {
                let name = node.child_by_field_name("name")?;
                self.resolve_name(name, src, within)
            }
            _ => {
                let text = src.text(node);
                match within {
                    Some(owner) => self.members.get(&owner)?.get(text).copied(),
                    None => self.lookup(text),
                }
            }
        }
    }

    // Items

    fn lower_items(&mut self, parent: NodeId, container: Node, src: &Source) {
        for child in container.named_children(&mut container.walk()) {
            self.lower_item(parent, child, src);
        }
    }

    fn lower_item(&mut self, parent: NodeId, node: Node, src: &Source) {
        match node.kind() {
            "namespace_definition" => self.lower_namespace(parent, node, src),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.lower_record(parent, node, src, Access::None);
            }
            "template_declaration" => self.lower_template(parent, node, src, Access::None, None),
            "function_definition" => {
                self.lower_function(parent, node, src, None, Access::None, None);
            }
            "declaration" => self.lower_declaration(parent, node, src),
            "alias_declaration" => {
                self.lower_alias(parent, node, src, Access::None);
            }
            "type_definition" => self.lower_typedef(parent, node, src, Access::None),
            "linkage_specification" => {
                if let Some(body) = node.child_by_field_name("body") {
                    match body.kind() {
                        "declaration_list" => self.lower_items(parent, body, src),
                        _ => self.lower_item(parent, body, src),
                    }
                }
            }
            "preproc_include" => self.lower_include(parent, node, src),
            "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif" | "preproc_elifdef" => {
                self.lower_items(parent, node, src);
            }
            "ERROR" => {
                for child in node.named_children(&mut node.walk()) {
                    match child.kind() {
                        "compound_statement" => self.lower_statement(parent, child, src),
                        _ => self.lower_item(parent, child, src),
                    }
                }
            }
            _ => {}
        }
    }

    fn lower_namespace(&mut self, parent: NodeId, node: Node, src: &Source) {
        let location = src.location(node);
        let name = node.child_by_field_name("name").map_or("", |n| src.text(n));

        if name.is_empty() {
            let namespace = self
                .builder
                .add_decl(parent, DeclKind::Namespace, "", location);
            if let Some(body) = node.child_by_field_name("body") {
                self.lower_items(namespace, body, src);
            }
            return;
        }

        let mut current = parent;
        let mut opened = 0;
        for segment in name.split("::").map(str::trim).filter(|s| !s.is_empty()) {
            let namespace = self
                .builder
                .add_decl(current, DeclKind::Namespace, segment, location);
            let owner = match self.lookup_local(segment) {
                Some(existing) if self.builder.node(existing).is_decl_kind(DeclKind::Namespace) => existing,
                _ => {
                    self.declare(segment, namespace);
                    namespace
                }
            };
            self.push_scope(Some(owner));
            opened += 1;
            current = namespace;
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.lower_items(current, body, src);
        }
        for _ in 0..opened {
            self.pop_scope();
        }
    }

    fn lower_include(&mut self, parent: NodeId, node: Node, src: &Source) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let raw = src.text(path_node);
        let (name, quoted) = match path_node.kind() {
            "string_literal" => (raw.trim_matches('"'), true),
            "system_lib_string" => (raw.trim_start_matches('<').trim_end_matches('>'), false),
            _ => return,
        };
        if src.depth >= MAX_INCLUDE_DEPTH {
            tracing::warn!("[parser] include depth {MAX_INCLUDE_DEPTH} exceeded at {name}");
            return;
        }

        let local = if quoted { src.dir.as_deref() } else { None };
        let Some(path) = self.find_include(name, local) else {
            tracing::trace!("[parser] include not found: {name}");
            return;
        };
        if !self.included.insert(path.clone()) {
            return;
        }

        let code = match std::fs::read_to_string(&path) {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!("[parser] cannot read {}: {e}", path.display());
                return;
            }
        };
        let Some(tree) = self.parser.parse(&code, None) else {
            tracing::warn!("[parser] failed to parse {}", path.display());
            return;
        };

        debug_event!("parser", "include", "{}", path.display());
        let file = self.builder.add_file(&path);
        let nested = Source {
            code: &code,
            file,
            dir: path.parent().map(Path::to_path_buf),
            depth: src.depth + 1,
        };
        let root = tree.root_node();
        self.collect_diagnostics(root, &nested);
        self.lower_items(parent, root, &nested);
    }

    fn find_include(&self, name: &str, local: Option<&Path>) -> Option<PathBuf> {
        local
            .into_iter()
            .chain(self.include_dirs.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    // Records and templates

    fn lower_record(&mut self, parent: NodeId, node: Node, src: &Source, access: Access) -> Option<NodeId> {
        let name_node = node.child_by_field_name("name");
        let body = node.child_by_field_name("body");

        // Explicit and partial specializations are not modelled.
        if name_node.is_some_and(|n| n.kind() != "type_identifier") {
            return None;
        }
        let name = name_node.map_or("", |n| src.text(n));
        let location = name_node.map_or_else(|| src.location(node), |n| src.location(n));

        let forward = self
            .lookup_local(name)
            .filter(|&d| {
                self.builder
                    .node(d)
                    .as_decl()
                    .is_some_and(|d| d.kind == DeclKind::CxxRecord && !d.has_body)
            });

        let Some(body) = body else {
            if let Some(existing) = self.lookup_local(name) {
                return Some(existing);
            }
            let record = self.builder.add_decl(parent, DeclKind::CxxRecord, name, location);
            self.set_access(record, access);
            self.declare(name, record);
            return Some(record);
        };

        let record = match forward {
            Some(record) => record,
            None => {
                let record = self.builder.add_decl(parent, DeclKind::CxxRecord, name, location);
                self.set_access(record, access);
                self.declare(name, record);
                record
            }
        };
        if let Some(data) = self.builder.decl_mut(record) {
            data.has_body = true;
        }
        self.lower_record_body(record, name, body, src, default_access(node));
        Some(record)
    }

    fn lower_record_body(&mut self, record: NodeId, name: &str, body: Node, src: &Source, default: Access) {
        self.push_scope(Some(record));
        self.declare(name, record);

        let mut access = default;
        for member in body.named_children(&mut body.walk()) {
            match member.kind() {
                "access_specifier" => access = access_from(src.text(member)),
                "field_declaration" => self.lower_field_declaration(record, name, member, src, access),
                "declaration" | "function_definition" => {
                    self.lower_function(record, member, src, Some(name), access, None);
                }
                "template_declaration" => self.lower_template(record, member, src, access, Some(name)),
                "alias_declaration" => {
                    self.lower_alias(record, member, src, access);
                }
                "type_definition" => self.lower_typedef(record, member, src, access),
                _ => {}
            }
        }

        self.pop_scope();
    }

    fn lower_field_declaration(&mut self, record: NodeId, class_name: &str, node: Node, src: &Source, access: Access) {
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut node.walk())
            .collect();

        if declarators.iter().any(|d| function_declarator(*d).is_some()) {
            self.lower_function(record, node, src, Some(class_name), access, None);
            return;
        }

        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let base = if is_record_definition(type_node) {
            match self.lower_record(record, type_node, src, access) {
                Some(nested) => self.builder.intern(Type::Record(nested)),
                None => self.unexposed(src.text(type_node)),
            }
        } else {
            self.lower_type(type_node, src)
        };
        let base = self.apply_qualifiers(node, base, src);

        for declarator in declarators {
            let (ty, name) = self.apply_declarator(base, Some(declarator), src);
            let Some(name) = name else {
                continue;
            };
            let location = src.location(name);
            let field = self
                .builder
                .add_decl(record, DeclKind::Field, src.text(name), location);
            self.set_access(field, access);
            self.set_type(field, ty);
            self.add_type_refs(field, ty, location);
            self.declare(src.text(name), field);
        }
    }

    fn lower_template(
        &mut self,
        parent: NodeId,
        node: Node,
        src: &Source,
        access: Access,
        class_name: Option<&str>,
    ) {
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };
        let Some(inner) = node
            .named_children(&mut node.walk())
            .find(|c| c.id() != params.id() && c.kind() != "comment" && c.kind() != "requires_clause")
        else {
            return;
        };

        match inner.kind() {
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.lower_class_template(parent, params, inner, src, access);
            }
            "function_definition" | "declaration" | "field_declaration" => {
                self.lower_function(parent, inner, src, class_name, access, Some(params));
            }
            "alias_declaration" => {
                self.push_scope(None);
                self.lower_template_params(None, params, src);
                let alias = self.lower_alias(parent, inner, src, access);
                self.pop_scope();
                if let (Some(alias), Some(name)) = (alias, inner.child_by_field_name("name")) {
                    self.declare(src.text(name), alias);
                }
            }
            other => tracing::trace!("[parser] skipping template of {other}"),
        }
    }

    fn lower_class_template(&mut self, parent: NodeId, params: Node, class: Node, src: &Source, access: Access) {
        let Some(name_node) = class.child_by_field_name("name") else {
            return;
        };
        if name_node.kind() != "type_identifier" {
            return;
        }
        let name = src.text(name_node);
        let template = self
            .builder
            .add_decl(parent, DeclKind::ClassTemplate, name, src.location(name_node));
        self.set_access(template, access);
        self.declare(name, template);

        self.push_scope(None);
        let params = self.lower_template_params(Some(template), params, src);
        if let Some(data) = self.builder.decl_mut(template) {
            data.template_params = params;
        }
        if let Some(body) = class.child_by_field_name("body") {
            if let Some(data) = self.builder.decl_mut(template) {
                data.has_body = true;
            }
            self.lower_record_body(template, name, body, src, default_access(class));
        }
        self.pop_scope();
    }

    /// Lower a template parameter list into the current scope. Parameters
    /// become children of `owner`, or detached declarations without one.
    fn lower_template_params(&mut self, owner: Option<NodeId>, list: Node, src: &Source) -> Vec<NodeId> {
        let mut params = Vec::new();
        for param in list.named_children(&mut list.walk()) {
            let location = src.location(param);
            let (kind, name, default) = match param.kind() {
                "type_parameter_declaration" | "variadic_type_parameter_declaration" => {
                    let name = first_named(param, &["type_identifier"]).map_or("", |n| src.text(n));
                    (DeclKind::TemplateTypeParm, name, None)
                }
                "optional_type_parameter_declaration" => {
                    let name = param.child_by_field_name("name").map_or("", |n| src.text(n));
                    (DeclKind::TemplateTypeParm, name, param.child_by_field_name("default_type"))
                }
                "template_template_parameter_declaration" => {
                    let name = first_named(param, &["type_parameter_declaration", "optional_type_parameter_declaration"])
                        .and_then(|p| first_named(p, &["type_identifier"]))
                        .map_or("", |n| src.text(n));
                    (DeclKind::TemplateTypeParm, name, None)
                }
                "parameter_declaration" | "optional_parameter_declaration" | "variadic_parameter_declaration" => {
                    let name = param
                        .child_by_field_name("declarator")
                        .map(innermost_declarator)
                        .map_or("", |n| src.text(n));
                    (DeclKind::NonTypeTemplateParm, name, param.child_by_field_name("default_value"))
                }
                _ => continue,
            };

            let decl = match owner {
                Some(owner) => self.builder.add_decl(owner, kind, name, location),
                None => self.builder.add_detached_decl(kind, name, location),
            };
            if kind == DeclKind::NonTypeTemplateParm {
                let ty = param
                    .child_by_field_name("type")
                    .map(|t| self.lower_type(t, src));
                if let Some(ty) = ty {
                    self.set_type(decl, ty);
                }
            }
            if let Some(default) = default {
                let default_type = match kind {
                    DeclKind::TemplateTypeParm => self.lower_type(default, src),
                    _ => self.unexposed(src.text(default)),
                };
                if let Some(data) = self.builder.decl_mut(decl) {
                    data.default_type = Some(default_type);
                }
            }
            self.declare(name, decl);
            params.push(decl);
        }
        params
    }

    fn lower_alias(&mut self, parent: NodeId, node: Node, src: &Source, access: Access) -> Option<NodeId> {
        let name = node.child_by_field_name("name")?;
        let type_node = node.child_by_field_name("type")?;
        let ty = self.lower_type(type_node, src);
        let location = src.location(name);

        let alias = self
            .builder
            .add_decl(parent, DeclKind::TypeAlias, src.text(name), location);
        self.set_access(alias, access);
        self.set_type(alias, ty);
        self.add_type_refs(alias, ty, location);
        self.declare(src.text(name), alias);
        Some(alias)
    }

    fn lower_typedef(&mut self, parent: NodeId, node: Node, src: &Source, access: Access) {
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let base = self.lower_type(type_node, src);
        let base = self.apply_qualifiers(node, base, src);

        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut node.walk())
            .collect();
        for declarator in declarators {
            let (ty, name) = self.apply_declarator(base, Some(declarator), src);
            let Some(name) = name else {
                continue;
            };
            let location = src.location(name);
            let typedef = self
                .builder
                .add_decl(parent, DeclKind::Typedef, src.text(name), location);
            self.set_access(typedef, access);
            self.set_type(typedef, ty);
            self.add_type_refs(typedef, ty, location);
            self.declare(src.text(name), typedef);
        }
    }

    // Functions

    /// Lower a function, method or constructor declared by `node`.
    ///
    /// `class_name` is set inside a class body; a function named after it is
    /// a constructor. With `template_params` the result is a function
    /// template carrying the parameters and the function's own parameters as
    /// children.
    fn lower_function(
        &mut self,
        parent: NodeId,
        node: Node,
        src: &Source,
        class_name: Option<&str>,
        access: Access,
        template_params: Option<Node>,
    ) -> Option<NodeId> {
        let declarator = node.child_by_field_name("declarator")?;
        let function = function_declarator(declarator)?;
        let name_node = function.child_by_field_name("declarator")?;
        let name = src.text(name_node);
        let location = src.location(name_node);

        let kind = match (template_params, name_node.kind()) {
            (Some(_), _) => DeclKind::FunctionTemplate,
            (None, "destructor_name") => DeclKind::CxxMethod,
            (None, "qualified_identifier") if is_out_of_line_constructor(name_node, src) => DeclKind::Constructor,
            (None, "qualified_identifier" | "field_identifier") => DeclKind::CxxMethod,
            (None, _) if class_name == Some(name) => DeclKind::Constructor,
            (None, _) if class_name.is_some() => DeclKind::CxxMethod,
            (None, _) => DeclKind::Function,
        };

        let decl = self.builder.add_decl(parent, kind, name, location);
        self.set_access(decl, access);
        let deleted = has_child(node, "delete_method_clause");
        let has_body = node.child_by_field_name("body").is_some() || has_child(node, "default_method_clause");
        if let Some(data) = self.builder.decl_mut(decl) {
            data.is_deleted = deleted;
            data.has_body = has_body;
        }
        if matches!(kind, DeclKind::Function | DeclKind::FunctionTemplate) && class_name.is_none() {
            self.declare(name, decl);
        }
        self.lower_attributes(decl, node, src);

        self.push_scope(None);
        if let Some(params) = template_params {
            let params = self.lower_template_params(Some(decl), params, src);
            if let Some(data) = self.builder.decl_mut(decl) {
                data.template_params = params;
            }
        }
        if let Some(return_type) = node.child_by_field_name("type") {
            let ty = self.lower_type(return_type, src);
            let ty = self.apply_qualifiers(node, ty, src);
            let (ty, _) = self.apply_declarator(ty, Some(declarator), src);
            self.set_type(decl, ty);
        }
        if let Some(params) = function.child_by_field_name("parameters") {
            for param in params.named_children(&mut params.walk()) {
                if matches!(
                    param.kind(),
                    "parameter_declaration" | "optional_parameter_declaration" | "variadic_parameter_declaration"
                ) {
                    self.lower_parameter(decl, param, src);
                }
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.lower_statement(decl, body, src);
        }
        self.pop_scope();

        Some(decl)
    }

    fn lower_parameter(&mut self, function: NodeId, node: Node, src: &Source) -> Option<NodeId> {
        let type_node = node.child_by_field_name("type")?;
        let base = self.lower_type(type_node, src);
        let base = self.apply_qualifiers(node, base, src);
        let (mut ty, name) = self.apply_declarator(base, node.child_by_field_name("declarator"), src);
        if node.kind() == "variadic_parameter_declaration" {
            let spelled = format!("{}...", self.builder.types().spelling(ty));
            ty = self.builder.intern(Type::Unexposed(spelled));
        }

        let spelling = name.map_or("", |n| src.text(n));
        let location = name.map_or_else(|| src.location(node), |n| src.location(n));
        let param = self
            .builder
            .add_decl(function, DeclKind::ParmVar, spelling, location);
        self.set_type(param, ty);
        if let Some(data) = self.builder.decl_mut(param) {
            data.has_default_arg = node.kind() == "optional_parameter_declaration";
        }
        self.add_type_refs(param, ty, location);
        self.declare(spelling, param);
        Some(param)
    }

    fn lower_attributes(&mut self, decl: NodeId, node: Node, src: &Source) {
        for child in node.children(&mut node.walk()) {
            if child.kind() != "attribute_declaration" {
                continue;
            }
            for attribute in child.named_children(&mut child.walk()) {
                if attribute.kind() != "attribute" {
                    continue;
                }
                let name = attribute
                    .child_by_field_name("name")
                    .map_or_else(|| src.text(attribute), |n| src.text(n));
                let kind = match name {
                    "deprecated" => AttrKind::Deprecated,
                    _ => AttrKind::Unexposed,
                };
                self.builder
                    .add_attr(decl, kind, name, src.location(attribute));
            }
        }
    }

    // Declarations with variables

    fn lower_declaration(&mut self, parent: NodeId, node: Node, src: &Source) {
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut node.walk())
            .collect();

        if declarators
            .first()
            .is_some_and(|d| d.kind() != "init_declarator" && function_declarator(*d).is_some())
        {
            self.lower_function(parent, node, src, None, Access::None, None);
            return;
        }

        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let base = if is_record_definition(type_node) {
            match self.lower_record(parent, type_node, src, Access::None) {
                Some(record) => self.builder.intern(Type::Record(record)),
                None => self.unexposed(src.text(type_node)),
            }
        } else {
            self.lower_type(type_node, src)
        };
        let base = self.apply_qualifiers(node, base, src);
        let deduced = type_node.kind() == "placeholder_type_specifier" || src.text(type_node) == "auto";

        for declarator in declarators {
            let (ty, name) = self.apply_declarator(base, Some(declarator), src);
            let Some(name) = name else {
                continue;
            };
            let location = src.location(name);
            let var = self
                .builder
                .add_decl(parent, DeclKind::Var, src.text(name), location);
            self.set_type(var, ty);
            self.declare(src.text(name), var);

            let mut initializer_type = None;
            if let Some(value) = declarator.child_by_field_name("value") {
                match value.kind() {
                    "argument_list" | "initializer_list" => {
                        for arg in value.named_children(&mut value.walk()) {
                            self.lower_expression(var, arg, src);
                        }
                    }
                    _ => {
                        initializer_type = self
                            .lower_expression(var, value, src)
                            .and_then(|e| self.builder.node(e).as_stmt().and_then(|s| s.ty));
                    }
                }
            }

            let ty = match (deduced, initializer_type) {
                (true, Some(init)) => {
                    let (ty, _) = self.apply_declarator(init, Some(declarator), src);
                    self.set_type(var, ty);
                    ty
                }
                _ => ty,
            };
            self.add_type_refs(var, ty, location);
        }
    }

    // Statements

    fn lower_statement(&mut self, parent: NodeId, node: Node, src: &Source) {
        let location = src.location(node);
        match node.kind() {
            "compound_statement" => {
                let block = self.builder.add_stmt(parent, StmtKind::CompoundStmt, "", location);
                self.push_scope(None);
                for child in node.named_children(&mut node.walk()) {
                    self.lower_statement(block, child, src);
                }
                self.pop_scope();
            }
            "declaration" => {
                let stmt = self.builder.add_stmt(parent, StmtKind::DeclStmt, "", location);
                self.lower_declaration(stmt, node, src);
            }
            "expression_statement" => {
                for child in node.named_children(&mut node.walk()) {
                    self.lower_expression(parent, child, src);
                }
            }
            "return_statement" => {
                let stmt = self.builder.add_stmt(parent, StmtKind::ReturnStmt, "", location);
                for child in node.named_children(&mut node.walk()) {
                    self.lower_expression(stmt, child, src);
                }
            }
            "alias_declaration" => {
                self.lower_alias(parent, node, src, Access::None);
            }
            "type_definition" => self.lower_typedef(parent, node, src, Access::None),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.lower_record(parent, node, src, Access::None);
            }
            "for_range_loop" => self.lower_range_for(parent, node, src),
            "ERROR" => self.lower_error(parent, node, src),
            "comment" => {}
            kind => {
                let stmt = self.builder.add_stmt(parent, StmtKind::UnexposedStmt, kind, location);
                self.push_scope(None);
                for child in node.named_children(&mut node.walk()) {
                    self.lower_any(stmt, child, src);
                }
                self.pop_scope();
            }
        }
    }

    fn lower_range_for(&mut self, parent: NodeId, node: Node, src: &Source) {
        let stmt = self
            .builder
            .add_stmt(parent, StmtKind::UnexposedStmt, node.kind(), src.location(node));
        self.push_scope(None);

        if let Some(range) = node.child_by_field_name("right") {
            self.lower_expression(stmt, range, src);
        }
        if let Some(type_node) = node.child_by_field_name("type") {
            let base = self.lower_type(type_node, src);
            let base = self.apply_qualifiers(node, base, src);
            let (ty, name) = self.apply_declarator(base, node.child_by_field_name("declarator"), src);
            if let Some(name) = name {
                let location = src.location(name);
                let var = self
                    .builder
                    .add_decl(stmt, DeclKind::Var, src.text(name), location);
                self.set_type(var, ty);
                self.add_type_refs(var, ty, location);
                self.declare(src.text(name), var);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.lower_statement(stmt, body, src);
        }

        self.pop_scope();
    }

    fn lower_any(&mut self, parent: NodeId, node: Node, src: &Source) {
        let kind = node.kind();
        if kind.ends_with("_statement") || matches!(kind, "declaration" | "for_range_loop" | "ERROR") {
            self.lower_statement(parent, node, src);
        } else if kind == "condition_clause" {
            for child in node.named_children(&mut node.walk()) {
                self.lower_any(parent, child, src);
            }
        } else if !is_type_syntax(kind) {
            self.lower_expression(parent, node, src);
        }
    }

    /// Recover calls from a region the grammar could not parse. A member
    /// access followed by `(` is taken as an unfinished member call.
    fn lower_error(&mut self, parent: NodeId, node: Node, src: &Source) {
        let children: Vec<Node> = node.children(&mut node.walk()).collect();
        let mut i = 0;
        while i < children.len() {
            let child = children[i];
            let opens_call = children.get(i + 1).is_some_and(|n| n.kind() == "(");
            if child.kind() == "field_expression" && opens_call {
                let call = self.lower_member_call(parent, child, src);
                for arg in children[i + 2..].iter().filter(|n| n.is_named()) {
                    self.lower_any(call, *arg, src);
                }
                return;
            }
            if child.is_named() {
                self.lower_any(parent, child, src);
            }
            i += 1;
        }
    }

    // Expressions

    fn lower_expression(&mut self, parent: NodeId, node: Node, src: &Source) -> Option<NodeId> {
        let location = src.location(node);
        let expr = match node.kind() {
            "call_expression" => self.lower_call(parent, node, src),
            "field_expression" => self.lower_member_ref(parent, node, src),
            "identifier" | "qualified_identifier" => self.lower_decl_ref(parent, node, src),
            "number_literal" => {
                let text = src.text(node);
                let (kind, ty) = if is_floating_literal(text) {
                    (StmtKind::FloatingLiteral, "double")
                } else {
                    (StmtKind::IntegerLiteral, "int")
                };
                self.literal(parent, kind, text, location, Some(ty))
            }
            "string_literal" | "raw_string_literal" | "concatenated_string" => {
                self.literal(parent, StmtKind::StringLiteral, src.text(node), location, None)
            }
            "char_literal" => self.literal(parent, StmtKind::CharacterLiteral, src.text(node), location, Some("char")),
            "true" | "false" => self.literal(parent, StmtKind::BoolLiteral, src.text(node), location, Some("bool")),
            "lambda_expression" => {
                let expr = self
                    .builder
                    .add_stmt(parent, StmtKind::UnexposedExpr, "lambda_expression", location);
                if let Some(body) = node.child_by_field_name("body") {
                    self.push_scope(None);
                    self.lower_statement(expr, body, src);
                    self.pop_scope();
                }
                expr
            }
            "compound_statement" => {
                self.lower_statement(parent, node, src);
                return None;
            }
            "ERROR" => {
                self.lower_error(parent, node, src);
                return None;
            }
            "comment" => return None,
            kind => {
                let expr = self.builder.add_stmt(parent, StmtKind::UnexposedExpr, kind, location);
                for child in node.named_children(&mut node.walk()) {
                    if !is_type_syntax(child.kind()) {
                        self.lower_expression(expr, child, src);
                    }
                }
                expr
            }
        };
        Some(expr)
    }

    fn literal(
        &mut self,
        parent: NodeId,
        kind: StmtKind,
        text: &str,
        location: Location,
        builtin: Option<&str>,
    ) -> NodeId {
        let expr = self.builder.add_stmt(parent, kind, text, location);
        let ty = builtin.map(|b| self.builder.builtin(b));
        if let Some(data) = self.builder.stmt_mut(expr) {
            data.ty = ty;
        }
        expr
    }

    fn lower_call(&mut self, parent: NodeId, node: Node, src: &Source) -> NodeId {
        let call = match node.child_by_field_name("function") {
            Some(function) if function.kind() == "field_expression" => {
                self.lower_member_call(parent, function, src)
            }
            Some(function) => {
                let spelling = src.text(innermost_name(function));
                let call = self
                    .builder
                    .add_stmt(parent, StmtKind::CallExpr, spelling, src.location(node));
                self.lower_expression(call, function, src);
                call
            }
            None => self
                .builder
                .add_stmt(parent, StmtKind::CallExpr, "", src.location(node)),
        };

        if let Some(arguments) = node.child_by_field_name("arguments") {
            for arg in arguments.named_children(&mut arguments.walk()) {
                self.lower_expression(call, arg, src);
            }
        }
        call
    }

    /// A member call is located at its member name, like the member
    /// reference it wraps.
    fn lower_member_call(&mut self, parent: NodeId, field_expression: Node, src: &Source) -> NodeId {
        let (name, location) = member_name(field_expression, src);
        let call = self
            .builder
            .add_stmt(parent, StmtKind::CxxMemberCallExpr, name, location);
        self.lower_member_ref(call, field_expression, src);
        call
    }

    fn lower_member_ref(&mut self, parent: NodeId, field_expression: Node, src: &Source) -> NodeId {
        let (name, location) = member_name(field_expression, src);
        let member = self
            .builder
            .add_stmt(parent, StmtKind::MemberRefExpr, name, location);
        if let Some(receiver) = field_expression.child_by_field_name("argument") {
            self.lower_expression(member, receiver, src);
        }
        member
    }

    fn lower_decl_ref(&mut self, parent: NodeId, node: Node, src: &Source) -> NodeId {
        let name = src.text(innermost_name(node));
        let expr = self
            .builder
            .add_stmt(parent, StmtKind::DeclRefExpr, name, src.location(node));

        let target = self.resolve_name(node, src, None).and_then(|decl| {
            let data = self.builder.node(decl).as_decl()?;
            match data.kind {
                DeclKind::Var | DeclKind::ParmVar | DeclKind::Field | DeclKind::Function => {
                    Some((decl, data.ty))
                }
                _ => None,
            }
        });
        if let Some((decl, ty)) = target {
            let ty = ty.map(|t| self.strip_reference(t));
            if let Some(data) = self.builder.stmt_mut(expr) {
                data.referenced = Some(decl);
                data.ty = ty;
            }
        }
        expr
    }

    // Types

    fn lower_type(&mut self, node: Node, src: &Source) -> TypeId {
        match node.kind() {
            "primitive_type" | "sized_type_specifier" => {
                let name = normalize(src.text(node));
                self.builder.builtin(&name)
            }
            "type_identifier" | "qualified_identifier" | "template_type" => self.lower_named_type(node, src),
            "type_descriptor" => {
                let base = match node.child_by_field_name("type") {
                    Some(t) => self.lower_type(t, src),
                    None => self.unexposed(src.text(node)),
                };
                let base = self.apply_qualifiers(node, base, src);
                let (ty, _) = self.apply_declarator(base, node.child_by_field_name("declarator"), src);
                ty
            }
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier" => {
                match node.child_by_field_name("name") {
                    Some(name) => self.lower_named_type(name, src),
                    None => self.unexposed(src.text(node)),
                }
            }
            _ => self.unexposed(src.text(node)),
        }
    }

    fn lower_named_type(&mut self, node: Node, src: &Source) -> TypeId {
        let innermost = innermost_name(node);
        let qualifier = &src.code[node.start_byte()..innermost.start_byte()];
        let Some(decl) = self.resolve_name(node, src, None) else {
            return self.unexposed(src.text(node));
        };

        let named = if innermost.kind() == "template_type" {
            if !self.builder.node(decl).is_decl_kind(DeclKind::ClassTemplate) {
                return self.unexposed(src.text(node));
            }
            let args = self.template_arguments(innermost, src);
            self.builder.specialization_type(decl, args)
        } else {
            match self.decl_type(decl) {
                Some(ty) => ty,
                None => return self.unexposed(src.text(node)),
            }
        };

        let is_class = matches!(
            self.builder.types().get(named),
            Some(Type::Record(_) | Type::TemplateSpecialization { .. })
        );
        if is_class || !qualifier.is_empty() {
            self.builder.elaborated(qualifier, named)
        } else {
            named
        }
    }

    fn template_arguments(&mut self, template_type: Node, src: &Source) -> Vec<TypeId> {
        let Some(list) = template_type.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut args = Vec::new();
        for arg in list.named_children(&mut list.walk()) {
            let ty = match arg.kind() {
                "type_descriptor" => self.lower_type(arg, src),
                "identifier" | "qualified_identifier" => {
                    match self.resolve_name(arg, src, None).and_then(|d| self.decl_type(d)) {
                        Some(ty) => ty,
                        None => self.unexposed(src.text(arg)),
                    }
                }
                "comment" => continue,
                _ => self.unexposed(src.text(arg)),
            };
            args.push(ty);
        }
        args
    }

    /// The type a declaration names when used as a type.
    fn decl_type(&mut self, decl: NodeId) -> Option<TypeId> {
        let (kind, ty, params) = {
            let data = self.builder.node(decl).as_decl()?;
            (data.kind, data.ty, data.template_params.clone())
        };
        match kind {
            DeclKind::CxxRecord | DeclKind::ClassTemplateSpecialization => {
                Some(self.builder.intern(Type::Record(decl)))
            }
            DeclKind::TemplateTypeParm => ty,
            DeclKind::TypeAlias | DeclKind::Typedef => Some(self.builder.intern(Type::Typedef(decl))),
            // Injected class name inside the template's own body
            DeclKind::ClassTemplate => {
                let mut args = Vec::with_capacity(params.len());
                for param in params {
                    let arg = match self.builder.node(param).as_decl().and_then(|d| {
                        (d.kind == DeclKind::TemplateTypeParm).then_some(d.ty).flatten()
                    }) {
                        Some(ty) => ty,
                        None => {
                            let spelling = self.builder.node(param).spelling.clone();
                            self.unexposed(&spelling)
                        }
                    };
                    args.push(arg);
                }
                Some(self.builder.specialization_type(decl, args))
            }
            _ => None,
        }
    }

    fn apply_qualifiers(&mut self, node: Node, base: TypeId, src: &Source) -> TypeId {
        let is_const = node
            .children(&mut node.walk())
            .any(|c| c.kind() == "type_qualifier" && src.text(c) == "const");
        if is_const {
            self.builder.intern(Type::Const(base))
        } else {
            base
        }
    }

    /// Wrap `base` in the pointer and reference layers of `declarator`,
    /// outermost first, and return the declared name if there is one.
    fn apply_declarator<'t>(
        &mut self,
        base: TypeId,
        declarator: Option<Node<'t>>,
        src: &Source,
    ) -> (TypeId, Option<Node<'t>>) {
        let Some(declarator) = declarator else {
            return (base, None);
        };
        match declarator.kind() {
            "reference_declarator" | "abstract_reference_declarator" => {
                let rvalue = declarator
                    .children(&mut declarator.walk())
                    .any(|c| c.kind() == "&&");
                let ty = if rvalue {
                    self.builder.intern(Type::RValueReference(base))
                } else {
                    self.builder.intern(Type::LValueReference(base))
                };
                let inner = declarator.named_children(&mut declarator.walk()).next();
                self.apply_declarator(ty, inner, src)
            }
            "pointer_declarator" | "abstract_pointer_declarator" => {
                let ty = self.builder.intern(Type::Pointer(base));
                self.apply_declarator(ty, declarator.child_by_field_name("declarator"), src)
            }
            "init_declarator"
            | "function_declarator"
            | "abstract_function_declarator"
            | "array_declarator"
            | "abstract_array_declarator"
            | "attributed_declarator" => {
                self.apply_declarator(base, declarator.child_by_field_name("declarator"), src)
            }
            "parenthesized_declarator" | "abstract_parenthesized_declarator" | "variadic_declarator" => {
                let inner = declarator.named_children(&mut declarator.walk()).next();
                self.apply_declarator(base, inner, src)
            }
            _ => (base, Some(declarator)),
        }
    }

    fn add_type_refs(&mut self, owner: NodeId, ty: TypeId, location: Location) {
        let Some(current) = self.builder.types().get(ty).cloned() else {
            return;
        };
        match current {
            Type::Elaborated { named: inner, .. }
            | Type::Const(inner)
            | Type::LValueReference(inner)
            | Type::RValueReference(inner)
            | Type::Pointer(inner) => self.add_type_refs(owner, inner, location),
            Type::TemplateSpecialization { template, args } => {
                self.builder
                    .add_ref(owner, RefKind::TemplateRef, template, location);
                for arg in args {
                    self.add_type_refs(owner, arg, location);
                }
            }
            Type::Record(decl) | Type::Typedef(decl) | Type::TemplateTypeParm(decl) => {
                self.builder.add_ref(owner, RefKind::TypeRef, decl, location);
            }
            Type::Builtin(_) | Type::Unexposed(_) => {}
        }
    }

    fn strip_reference(&self, ty: TypeId) -> TypeId {
        match self.builder.types().get(ty) {
            Some(Type::LValueReference(inner) | Type::RValueReference(inner)) => *inner,
            _ => ty,
        }
    }

    fn unexposed(&mut self, text: &str) -> TypeId {
        self.builder.intern(Type::Unexposed(normalize(text)))
    }

    fn set_type(&mut self, decl: NodeId, ty: TypeId) {
        if let Some(data) = self.builder.decl_mut(decl) {
            data.ty = Some(ty);
        }
    }

    fn set_access(&mut self, decl: NodeId, access: Access) {
        if let Some(data) = self.builder.decl_mut(decl) {
            data.access = access;
        }
    }
}

fn member_name<'s>(field_expression: Node, src: &Source<'s>) -> (&'s str, Location) {
    match field_expression.child_by_field_name("field") {
        Some(field) => {
            let name = match field.kind() {
                "template_method" => field.child_by_field_name("name").unwrap_or(field),
                _ => field,
            };
            (src.text(name), src.location(name))
        }
        None => ("", src.location(field_expression)),
    }
}

/// The last segment of a qualified name.
fn innermost_name(node: Node) -> Node {
    let mut current = node;
    while current.kind() == "qualified_identifier" {
        match current.child_by_field_name("name") {
            Some(name) => current = name,
            None => break,
        }
    }
    current
}

fn innermost_declarator(node: Node) -> Node {
    let mut current = node;
    loop {
        let next = match current.kind() {
            "reference_declarator" | "parenthesized_declarator" | "variadic_declarator" => {
                current.named_children(&mut current.walk()).next()
            }
            "pointer_declarator" | "init_declarator" | "array_declarator" | "attributed_declarator" => {
                current.child_by_field_name("declarator")
            }
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return current,
        }
    }
}

/// The function declarator inside `node`, looking through pointer and
/// reference layers of the return type.
fn function_declarator(node: Node) -> Option<Node> {
    match node.kind() {
        "function_declarator" => Some(node),
        "reference_declarator" | "parenthesized_declarator" => {
            function_declarator(node.named_children(&mut node.walk()).next()?)
        }
        "pointer_declarator" | "attributed_declarator" => function_declarator(node.child_by_field_name("declarator")?),
        _ => None,
    }
}

/// `Widget::Widget` and `ns::Widget::Widget`.
fn is_out_of_line_constructor(name: Node, src: &Source) -> bool {
    let segments: Vec<&str> = src.text(name).split("::").map(str::trim).collect();
    matches!(segments.as_slice(), [.., class, ctor] if !class.is_empty() && class == ctor)
}

fn first_named<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    node.named_children(&mut node.walk())
        .find(|c| kinds.contains(&c.kind()))
}

fn has_child(node: Node, kind: &str) -> bool {
    node.children(&mut node.walk()).any(|c| c.kind() == kind)
}

fn is_record_definition(node: Node) -> bool {
    matches!(node.kind(), "class_specifier" | "struct_specifier" | "union_specifier")
        && node.child_by_field_name("body").is_some()
}

fn default_access(record: Node) -> Access {
    match record.kind() {
        "class_specifier" => Access::Private,
        _ => Access::Public,
    }
}

fn access_from(text: &str) -> Access {
    match text.trim() {
        "public" => Access::Public,
        "protected" => Access::Protected,
        "private" => Access::Private,
        _ => Access::None,
    }
}

fn is_type_syntax(kind: &str) -> bool {
    kind.ends_with("_declarator")
        || kind.ends_with("_type_specifier")
        || matches!(
            kind,
            "primitive_type" | "type_identifier" | "template_type" | "type_descriptor" | "type_qualifier"
        )
}

fn is_floating_literal(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") {
        lower.contains('p')
    } else {
        lower.contains('.') || lower.contains('e')
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
