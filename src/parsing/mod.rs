pub mod cpp;
pub mod error;
pub mod parser;

pub use cpp::CppParser;
pub use error::ParseError;
pub use parser::{AstBackend, DEFAULT_FLAGS, Diagnostic, ParseRequest, TranslationUnit};
