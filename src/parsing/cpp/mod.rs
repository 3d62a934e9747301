//! C++ front end built on tree-sitter.

mod flags;
mod lower;
mod parser;

pub use flags::CompileFlags;
pub use parser::CppParser;
