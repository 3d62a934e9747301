use std::path::PathBuf;
use thiserror::Error;

/// Errors raised before or while producing a translation unit.
///
/// Syntax errors in the source are not among them: they are reported as
/// diagnostics on an otherwise usable tree.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to set C++ language: {0}")]
    LanguageSetup(String),

    #[error("Failed to parse {}", path.display())]
    ParseFailed { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported compiler flag `{flag}`: {reason}")]
    UnsupportedFlag { flag: String, reason: String },
}

impl ParseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
