use crate::ast::{Ast, NodeId};
use crate::types::FileId;

/// Accepts nodes located in a single file.
///
/// Only consulted during ordinary descent; subtrees entered through a
/// reference are walked unfiltered, so declarations from included headers
/// stay reachable while call discovery stays inside the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFilter {
    file: FileId,
}

impl FileFilter {
    pub fn new(file: FileId) -> Self {
        Self { file }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn accepts(&self, ast: &Ast, node: NodeId) -> bool {
        ast.node(node).location.file == self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, DeclKind};
    use crate::types::Location;

    #[test]
    fn test_accepts_only_target_file() {
        let mut builder = AstBuilder::new("main.cpp");
        let header = builder.add_file("widget.h");
        let root = builder.root();
        let main = builder.main_file();
        let in_main = builder.add_decl(root, DeclKind::Var, "v", Location::new(main, 3, 1));
        let in_header = builder.add_decl(root, DeclKind::CxxRecord, "Widget", Location::new(header, 1, 1));
        let ast = builder.finish();

        let filter = FileFilter::new(main);
        assert!(filter.accepts(&ast, in_main));
        assert!(!filter.accepts(&ast, in_header));
        assert_eq!(filter.file(), main);
    }
}
