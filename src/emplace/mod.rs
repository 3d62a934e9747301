//! Constructor discovery for `emplace`/`emplace_back` calls.
//!
//! Given a parsed translation unit and a target line, find member calls named
//! `emplace` or `emplace_back` on a variable whose type is a specialization
//! of a class template exposing `value_type`, and list the constructors of
//! the element type once per callable arity.

mod effective;
mod resolver;

pub use effective::{EffectiveConstructor, Parameter, effective_constructors};
pub use resolver::{
    EMPLACE_METHODS, EmplaceVisitor, IdentityPolicy, QueryTarget, ResolvedCall, ResolverOptions,
    Unqualified, VALUE_TYPE_ALIAS, element_constructors, find_emplace_constructors, resolve_call,
};
