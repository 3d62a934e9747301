//! Constructor signature help for `emplace`/`emplace_back` calls on C++
//! containers.
//!
//! The pipeline parses one translation unit into an [`ast::Ast`], walks it
//! with the [`walker`], resolves qualifying member calls in [`emplace`] and
//! renders each reachable constructor through [`signature`].

pub mod logging;

pub mod ast;
pub mod cli;
pub mod config;
pub mod emplace;
pub mod parsing;
pub mod service;
pub mod signature;
pub mod types;
pub mod walker;

pub use config::Settings;
pub use emplace::{
    EffectiveConstructor, IdentityPolicy, Parameter, QueryTarget, ResolverOptions,
    find_emplace_constructors,
};
pub use parsing::{AstBackend, CppParser, ParseError, ParseRequest, TranslationUnit};
pub use service::SignatureService;
pub use signature::{Signature, SignatureParameter, SpanPolicy};
pub use types::{FileId, Location, Span};
