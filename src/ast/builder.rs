//! Incremental construction of an [`Ast`].
//!
//! The builder owns the node arena and the type table while a front end
//! lowers source into it. Class template uses are specialized on demand:
//! the first request for `Tpl<Args...>` creates a detached
//! `ClassTemplateSpecialization` declaration whose constructors are copies of
//! the template's, with the arguments substituted for the type parameters.

use super::types::{Type, TypeId, TypeTable};
use super::{
    AttrData, AttrKind, Ast, DeclData, DeclKind, Node, NodeData, NodeId, RefData, RefKind,
    StmtData, StmtKind,
};
use crate::types::{FileId, Location};
use std::collections::HashMap;
use std::path::PathBuf;

pub struct AstBuilder {
    nodes: Vec<Node>,
    types: TypeTable,
    files: Vec<PathBuf>,
    root: NodeId,
    specializations: HashMap<(NodeId, Vec<TypeId>), NodeId>,
}

impl AstBuilder {
    /// Start a tree whose translation unit belongs to `main_file`.
    pub fn new(main_file: impl Into<PathBuf>) -> Self {
        let main_file = main_file.into();
        let spelling = main_file.display().to_string();
        let mut builder = Self {
            nodes: Vec::new(),
            types: TypeTable::default(),
            files: vec![main_file],
            root: NodeId::from_index(0),
            specializations: HashMap::new(),
        };
        let location = Location::new(FileId::from_index(0), 1, 1);
        builder.root = builder.new_decl(None, DeclKind::TranslationUnit, spelling, location);
        builder
    }

    pub fn main_file(&self) -> FileId {
        FileId::from_index(0)
    }

    /// Register another file (e.g. an included header).
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> FileId {
        let path = path.into();
        if let Some(index) = self.files.iter().position(|f| *f == path) {
            return FileId::from_index(index);
        }
        self.files.push(path);
        FileId::from_index(self.files.len() - 1)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn add_decl(
        &mut self,
        parent: NodeId,
        kind: DeclKind,
        spelling: impl Into<String>,
        location: Location,
    ) -> NodeId {
        self.new_decl(Some(parent), kind, spelling.into(), location)
    }

    /// A declaration that is not part of the tree, only reachable through
    /// references and types.
    pub fn add_detached_decl(
        &mut self,
        kind: DeclKind,
        spelling: impl Into<String>,
        location: Location,
    ) -> NodeId {
        self.new_decl(None, kind, spelling.into(), location)
    }

    pub fn add_stmt(
        &mut self,
        parent: NodeId,
        kind: StmtKind,
        spelling: impl Into<String>,
        location: Location,
    ) -> NodeId {
        let data = NodeData::Stmt(StmtData {
            kind,
            ty: None,
            referenced: None,
        });
        self.push(Some(parent), spelling.into(), location, data)
    }

    pub fn add_attr(
        &mut self,
        parent: NodeId,
        kind: AttrKind,
        spelling: impl Into<String>,
        location: Location,
    ) -> NodeId {
        self.push(Some(parent), spelling.into(), location, NodeData::Attr(AttrData { kind }))
    }

    /// Add a reference node; its spelling is the referenced node's.
    pub fn add_ref(
        &mut self,
        parent: NodeId,
        kind: RefKind,
        referenced: NodeId,
        location: Location,
    ) -> NodeId {
        let spelling = self.node(referenced).spelling.clone();
        let data = NodeData::Ref(RefData { kind, referenced });
        self.push(Some(parent), spelling, location, data)
    }

    /// Append an existing node to `parent`'s children.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.index()].children.push(child);
    }

    pub fn decl_mut(&mut self, id: NodeId) -> Option<&mut DeclData> {
        match &mut self.nodes.get_mut(id.index())?.data {
            NodeData::Decl(d) => Some(d),
            _ => None,
        }
    }

    pub fn stmt_mut(&mut self, id: NodeId) -> Option<&mut StmtData> {
        match &mut self.nodes.get_mut(id.index())?.data {
            NodeData::Stmt(s) => Some(s),
            _ => None,
        }
    }

    pub fn builtin(&mut self, name: &str) -> TypeId {
        self.intern(Type::Builtin(name.to_string()))
    }

    pub fn elaborated(&mut self, qualifier: impl Into<String>, named: TypeId) -> TypeId {
        self.intern(Type::Elaborated {
            qualifier: qualifier.into(),
            named,
        })
    }

    /// Intern `ty`, computing its spelling and canonical form.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.types.lookup(&ty) {
            return id;
        }
        if let Type::TemplateSpecialization { template, args } = &ty {
            return self.specialization_type(*template, args.clone());
        }
        let canonical = self.canonical_of(&ty);
        let spelling = self.spell(&ty);
        self.types.insert(ty, canonical, spelling)
    }

    /// `template<args...>` as written. Non-dependent uses are specialized and
    /// canonicalize to the specialization's record type.
    pub fn specialization_type(&mut self, template: NodeId, args: Vec<TypeId>) -> TypeId {
        let key = Type::TemplateSpecialization {
            template,
            args: args.clone(),
        };
        if let Some(id) = self.types.lookup(&key) {
            return id;
        }
        let dependent = args.iter().any(|a| self.types.is_dependent(*a));
        let canonical = if dependent {
            None
        } else {
            self.specialize(template, args)
                .map(|decl| self.intern(Type::Record(decl)))
        };
        let spelling = self.spell(&key);
        self.types.insert(key, canonical, spelling)
    }

    /// Find or create the specialization of a class template.
    ///
    /// Missing trailing arguments are filled from the parameters' defaults;
    /// returns `None` when `template` is not a class template or the argument
    /// list cannot be completed.
    pub fn specialize(&mut self, template: NodeId, args: Vec<TypeId>) -> Option<NodeId> {
        let decl = self.node(template).as_decl()?;
        if decl.kind != DeclKind::ClassTemplate {
            return None;
        }
        let params = decl.template_params.clone();
        if args.len() > params.len() {
            return None;
        }

        // Specializations are keyed by canonical arguments, so
        // `Box<Widget>` and `Box<ns::Widget>` share one declaration.
        let mut args: Vec<TypeId> = args.into_iter().map(|a| self.types.canonical(a)).collect();
        while args.len() < params.len() {
            let default = self.node(params[args.len()]).as_decl()?.default_type?;
            let filled = args.len();
            let resolved = self.substitute(default, &params[..filled], &args);
            args.push(self.types.canonical(resolved));
        }

        let key = (template, args.clone());
        if let Some(existing) = self.specializations.get(&key) {
            return Some(*existing);
        }

        let spelling = self.node(template).spelling.clone();
        let location = self.node(template).location;
        let spec = self.new_decl(
            None,
            DeclKind::ClassTemplateSpecialization,
            spelling.clone(),
            location,
        );
        if let Some(data) = self.decl_mut(spec) {
            data.template_args = args.clone();
            data.specialized_from = Some(template);
        }
        // Registered before members are instantiated so self-referencing
        // constructors find it.
        self.specializations.insert(key, spec);

        let members = self.node(template).children.clone();
        for member in members {
            let node = self.node(member);
            let is_ctor = match node.as_decl().map(|d| d.kind) {
                Some(DeclKind::Constructor) => true,
                Some(DeclKind::FunctionTemplate) => node.spelling == spelling,
                _ => false,
            };
            if is_ctor {
                self.instantiate_member(spec, member, &params, &args);
            }
        }

        Some(spec)
    }

    pub fn finish(self) -> Ast {
        Ast {
            nodes: self.nodes,
            types: self.types,
            files: self.files,
            root: self.root,
        }
    }

    fn instantiate_member(
        &mut self,
        parent: NodeId,
        member: NodeId,
        params: &[NodeId],
        args: &[TypeId],
    ) {
        let source = self.node(member).clone();
        let copy = self.push(Some(parent), source.spelling, source.location, source.data);

        for child in source.children {
            let child_node = self.node(child).clone();
            match child_node.data {
                NodeData::Decl(mut data) if data.kind == DeclKind::ParmVar => {
                    data.ty = data.ty.map(|ty| self.substitute(ty, params, args));
                    self.push(
                        Some(copy),
                        child_node.spelling,
                        child_node.location,
                        NodeData::Decl(data),
                    );
                }
                _ => self.attach(copy, child),
            }
        }
    }

    fn substitute(&mut self, ty: TypeId, params: &[NodeId], args: &[TypeId]) -> TypeId {
        let Some(current) = self.types.get(ty).cloned() else {
            return ty;
        };
        match current {
            Type::TemplateTypeParm(decl) => params
                .iter()
                .position(|&p| p == decl)
                .and_then(|i| args.get(i).copied())
                .unwrap_or(ty),
            Type::Elaborated { qualifier, named } => {
                let inner = self.substitute(named, params, args);
                if inner == named {
                    ty
                } else {
                    self.intern(Type::Elaborated {
                        qualifier,
                        named: inner,
                    })
                }
            }
            Type::TemplateSpecialization {
                template,
                args: written,
            } => {
                let mut substituted = Vec::with_capacity(written.len());
                for arg in written {
                    substituted.push(self.substitute(arg, params, args));
                }
                self.specialization_type(template, substituted)
            }
            Type::Const(inner) => {
                let inner = self.substitute(inner, params, args);
                self.intern(Type::Const(inner))
            }
            Type::LValueReference(inner) => {
                let inner = self.substitute(inner, params, args);
                self.intern(Type::LValueReference(inner))
            }
            Type::RValueReference(inner) => {
                let inner = self.substitute(inner, params, args);
                self.intern(Type::RValueReference(inner))
            }
            Type::Pointer(inner) => {
                let inner = self.substitute(inner, params, args);
                self.intern(Type::Pointer(inner))
            }
            _ => ty,
        }
    }

    fn canonical_of(&mut self, ty: &Type) -> Option<TypeId> {
        match ty {
            Type::Elaborated { named, .. } => Some(self.types.canonical(*named)),
            Type::Typedef(decl) => {
                let underlying = self.node(*decl).as_decl()?.ty?;
                Some(self.types.canonical(underlying))
            }
            Type::Const(inner) => self.wrap_canonical(*inner, Type::Const),
            Type::LValueReference(inner) => self.wrap_canonical(*inner, Type::LValueReference),
            Type::RValueReference(inner) => self.wrap_canonical(*inner, Type::RValueReference),
            Type::Pointer(inner) => self.wrap_canonical(*inner, Type::Pointer),
            _ => None,
        }
    }

    fn wrap_canonical(&mut self, inner: TypeId, wrap: fn(TypeId) -> Type) -> Option<TypeId> {
        let canonical = self.types.canonical(inner);
        (canonical != inner).then(|| self.intern(wrap(canonical)))
    }

    fn spell(&self, ty: &Type) -> String {
        match ty {
            Type::Builtin(name) | Type::Unexposed(name) => name.clone(),
            Type::Record(decl) => {
                let node = self.node(*decl);
                match node.as_decl() {
                    Some(d) if d.kind == DeclKind::ClassTemplateSpecialization => {
                        format!("{}<{}>", node.spelling, self.spell_list(&d.template_args))
                    }
                    _ => node.spelling.clone(),
                }
            }
            Type::Elaborated { qualifier, named } => {
                format!("{qualifier}{}", self.types.spelling(*named))
            }
            Type::TemplateSpecialization { template, args } => {
                format!("{}<{}>", self.node(*template).spelling, self.spell_list(args))
            }
            Type::TemplateTypeParm(decl) | Type::Typedef(decl) => self.node(*decl).spelling.clone(),
            Type::Const(inner) => format!("const {}", self.types.spelling(*inner)),
            Type::LValueReference(inner) => format!("{} &", self.types.spelling(*inner)),
            Type::RValueReference(inner) => format!("{} &&", self.types.spelling(*inner)),
            Type::Pointer(inner) => format!("{} *", self.types.spelling(*inner)),
        }
    }

    fn spell_list(&self, args: &[TypeId]) -> String {
        args.iter()
            .map(|a| self.types.spelling(*a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn new_decl(
        &mut self,
        parent: Option<NodeId>,
        kind: DeclKind,
        spelling: String,
        location: Location,
    ) -> NodeId {
        let data = NodeData::Decl(DeclData {
            kind,
            access: Default::default(),
            is_invalid: false,
            is_deleted: false,
            has_body: false,
            has_default_arg: false,
            ty: None,
            default_type: None,
            template_params: Vec::new(),
            template_args: Vec::new(),
            specialized_from: None,
        });
        let id = self.push(parent, spelling, location, data);
        if kind == DeclKind::TemplateTypeParm {
            let ty = self.intern(Type::TemplateTypeParm(id));
            if let Some(data) = self.decl_mut(id) {
                data.ty = Some(ty);
            }
        }
        id
    }

    fn push(
        &mut self,
        parent: Option<NodeId>,
        spelling: String,
        location: Location,
        data: NodeData,
    ) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            spelling,
            location,
            children: Vec::new(),
            data,
        });
        if let Some(parent) = parent {
            self.attach(parent, id);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(builder: &AstBuilder, line: u32) -> Location {
        Location::new(builder.main_file(), line, 1)
    }

    /// `template <typename T> struct Box { Box(const T &value); };`
    fn box_template(builder: &mut AstBuilder) -> (NodeId, NodeId) {
        let root = builder.root();
        let l = loc(builder, 1);
        let template = builder.add_decl(root, DeclKind::ClassTemplate, "Box", l);
        let param = builder.add_decl(template, DeclKind::TemplateTypeParm, "T", l);
        builder.decl_mut(template).unwrap().template_params.push(param);

        let ctor = builder.add_decl(template, DeclKind::Constructor, "Box", l);
        builder.decl_mut(ctor).unwrap().access = crate::ast::Access::Public;
        let parm = builder.add_decl(ctor, DeclKind::ParmVar, "value", l);
        let t = builder.node(param).as_decl().unwrap().ty.unwrap();
        let const_t = builder.intern(Type::Const(t));
        let ref_t = builder.intern(Type::LValueReference(const_t));
        builder.decl_mut(parm).unwrap().ty = Some(ref_t);
        (template, param)
    }

    #[test]
    fn test_template_type_parm_has_type_for_decl() {
        let mut builder = AstBuilder::new("main.cpp");
        let (_, param) = box_template(&mut builder);
        let ty = builder.node(param).as_decl().unwrap().ty.unwrap();
        assert_eq!(builder.types().get(ty), Some(&Type::TemplateTypeParm(param)));
        assert_eq!(builder.types().spelling(ty), "T");
    }

    #[test]
    fn test_specialization_substitutes_constructor_parameters() {
        let mut builder = AstBuilder::new("main.cpp");
        let (template, _) = box_template(&mut builder);
        let int = builder.builtin("int");

        let tst = builder.specialization_type(template, vec![int]);
        assert_eq!(builder.types().spelling(tst), "Box<int>");

        let canonical = builder.types().canonical(tst);
        let spec = builder.types().record_decl(canonical).unwrap();
        let spec_node = builder.node(spec);
        assert!(spec_node.is_decl_kind(DeclKind::ClassTemplateSpecialization));
        assert_eq!(spec_node.as_decl().unwrap().template_args, vec![int]);

        let ctor = spec_node.children[0];
        let parm = builder.node(ctor).children[0];
        let parm_ty = builder.node(parm).as_decl().unwrap().ty.unwrap();
        assert_eq!(builder.types().spelling(parm_ty), "const int &");
    }

    #[test]
    fn test_specialization_is_shared() {
        let mut builder = AstBuilder::new("main.cpp");
        let (template, _) = box_template(&mut builder);
        let int = builder.builtin("int");

        let first = builder.specialize(template, vec![int]).unwrap();
        let second = builder.specialize(template, vec![int]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dependent_specialization_is_not_instantiated() {
        let mut builder = AstBuilder::new("main.cpp");
        let (template, param) = box_template(&mut builder);
        let t = builder.node(param).as_decl().unwrap().ty.unwrap();

        let tst = builder.specialization_type(template, vec![t]);
        assert_eq!(builder.types().canonical(tst), tst);
    }

    #[test]
    fn test_default_template_argument_fills_missing() {
        let mut builder = AstBuilder::new("main.cpp");
        let (template, _) = box_template(&mut builder);
        let l = loc(&builder, 1);
        let extra = builder.add_decl(template, DeclKind::TemplateTypeParm, "Tag", l);
        let void = builder.builtin("void");
        builder.decl_mut(extra).unwrap().default_type = Some(void);
        builder.decl_mut(template).unwrap().template_params.push(extra);

        let int = builder.builtin("int");
        let spec = builder.specialize(template, vec![int]).unwrap();
        assert_eq!(builder.node(spec).as_decl().unwrap().template_args, vec![int, void]);

        let not_template = builder.root();
        assert!(builder.specialize(not_template, vec![int]).is_none());
    }

    #[test]
    fn test_typedef_canonicalizes_to_underlying() {
        let mut builder = AstBuilder::new("main.cpp");
        let root = builder.root();
        let l = loc(&builder, 2);
        let alias = builder.add_decl(root, DeclKind::TypeAlias, "Count", l);
        let int = builder.builtin("int");
        builder.decl_mut(alias).unwrap().ty = Some(int);

        let typedef = builder.intern(Type::Typedef(alias));
        assert_eq!(builder.types().canonical(typedef), int);
        assert_eq!(builder.types().spelling(typedef), "Count");

        let reference = builder.intern(Type::LValueReference(typedef));
        let canonical = builder.types().canonical(reference);
        assert_eq!(builder.types().get(canonical), Some(&Type::LValueReference(int)));
    }
}
