//! Front-end interface
//!
//! A backend turns a source file, optionally replaced by the editor's unsaved
//! buffer, into an [`Ast`] the query engine can walk.

use super::ParseError;
use crate::ast::Ast;
use crate::types::{FileId, Location};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Flags used when the caller supplies none.
pub const DEFAULT_FLAGS: &[&str] = &["-std=c++17", "-xc++", "-Wno-pragma-once-outside-header"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRequest {
    pub path: PathBuf,
    /// Unsaved buffer contents; the file is read from disk when `None`.
    pub contents: Option<String>,
    pub flags: Vec<String>,
}

impl ParseRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: None,
            flags: DEFAULT_FLAGS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Source text of the main file.
    pub fn source(&self) -> Result<String, ParseError> {
        match &self.contents {
            Some(contents) => Ok(contents.clone()),
            None => std::fs::read_to_string(&self.path).map_err(|e| ParseError::io(&self.path, e)),
        }
    }
}

/// A problem the front end recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
}

#[derive(Debug)]
pub struct TranslationUnit {
    pub ast: Ast,
    /// Identity of the requested file inside `ast`
    pub file: FileId,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslationUnit {
    pub fn path(&self) -> Option<&Path> {
        self.ast.file_path(self.file)
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Common interface for C++ front ends.
pub trait AstBackend {
    fn parse(&mut self, request: &ParseRequest) -> Result<TranslationUnit, ParseError>;
}
