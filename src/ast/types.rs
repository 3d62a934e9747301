//! Interned type table.

use super::NodeId;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Builtin(String),
    /// A class or struct, including specializations
    Record(NodeId),
    /// A type written with (possibly empty) name qualification
    Elaborated { qualifier: String, named: TypeId },
    TemplateSpecialization { template: NodeId, args: Vec<TypeId> },
    TemplateTypeParm(NodeId),
    Typedef(NodeId),
    Const(TypeId),
    LValueReference(TypeId),
    RValueReference(TypeId),
    Pointer(TypeId),
    /// Anything the front end could not resolve, kept by spelling
    Unexposed(String),
}

#[derive(Debug, Clone)]
struct TypeEntry {
    ty: Type,
    canonical: TypeId,
    spelling: String,
}

#[derive(Debug, Default)]
pub struct TypeTable {
    entries: Vec<TypeEntry>,
    interned: HashMap<Type, TypeId>,
}

impl TypeTable {
    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.entries.get(id.index()).map(|e| &e.ty)
    }

    /// Fully resolved form of `id`: aliases and elaboration stripped.
    pub fn canonical(&self, id: TypeId) -> TypeId {
        self.entries.get(id.index()).map_or(id, |e| e.canonical)
    }

    pub fn spelling(&self, id: TypeId) -> &str {
        self.entries.get(id.index()).map_or("", |e| e.spelling.as_str())
    }

    pub fn lookup(&self, ty: &Type) -> Option<TypeId> {
        self.interned.get(ty).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unwrap elaboration and const qualification down to a template
    /// specialization type.
    pub fn template_specialization(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id)? {
            Type::TemplateSpecialization { .. } => Some(id),
            Type::Elaborated { named, .. } => self.template_specialization(*named),
            Type::Const(inner) => self.template_specialization(*inner),
            _ => None,
        }
    }

    /// Declaration of a record type, if `id` is one.
    pub fn record_decl(&self, id: TypeId) -> Option<NodeId> {
        match self.get(id)? {
            Type::Record(decl) => Some(*decl),
            _ => None,
        }
    }

    /// Whether `id` mentions a template type parameter anywhere.
    pub fn is_dependent(&self, id: TypeId) -> bool {
        match self.get(id) {
            Some(Type::TemplateTypeParm(_)) => true,
            Some(Type::Elaborated { named, .. }) => self.is_dependent(*named),
            Some(Type::TemplateSpecialization { args, .. }) => {
                args.iter().any(|a| self.is_dependent(*a))
            }
            Some(
                Type::Const(inner)
                | Type::LValueReference(inner)
                | Type::RValueReference(inner)
                | Type::Pointer(inner),
            ) => self.is_dependent(*inner),
            _ => false,
        }
    }

    /// Insert a type that is not yet interned. `canonical` of `None` makes
    /// the type its own canonical form.
    pub(super) fn insert(&mut self, ty: Type, canonical: Option<TypeId>, spelling: String) -> TypeId {
        if let Some(existing) = self.interned.get(&ty) {
            return *existing;
        }
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(TypeEntry {
            ty: ty.clone(),
            canonical: canonical.unwrap_or(id),
            spelling,
        });
        self.interned.insert(ty, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_identity() {
        let mut table = TypeTable::default();
        let a = table.insert(Type::Builtin("int".into()), None, "int".into());
        let b = table.insert(Type::Builtin("int".into()), None, "int".into());
        let c = table.insert(Type::Builtin("char".into()), None, "char".into());

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.canonical(a), a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_template_specialization_unwrap() {
        let mut table = TypeTable::default();
        let record = table.insert(Type::Record(NodeId::from_index(4)), None, "Box<int>".into());
        let tst = table.insert(
            Type::TemplateSpecialization {
                template: NodeId::from_index(2),
                args: vec![],
            },
            Some(record),
            "Box<int>".into(),
        );
        let elaborated = table.insert(
            Type::Elaborated {
                qualifier: String::new(),
                named: tst,
            },
            Some(record),
            "Box<int>".into(),
        );
        let constant = table.insert(Type::Const(elaborated), None, "const Box<int>".into());

        assert_eq!(table.template_specialization(elaborated), Some(tst));
        assert_eq!(table.template_specialization(constant), Some(tst));
        assert_eq!(table.template_specialization(record), None);
        assert_eq!(table.record_decl(table.canonical(tst)), Some(NodeId::from_index(4)));
    }
}
