//! Dump command - output the lowered AST as JSONL.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::ast::{Ast, Category, NodeData, NodeId, NodeKind};
use crate::config::Settings;
use crate::parsing::{AstBackend, CppParser, ParseRequest};

/// One line of dump output.
#[derive(Debug, Serialize)]
pub struct NodeRecord<'a> {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub category: Category,
    pub kind: String,
    pub spelling: &'a str,
    pub file: Option<&'a Path>,
    pub line: u32,
    pub column: u32,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced: Option<NodeId>,
}

/// Run dump command
pub fn run(file: &Path, output: Option<PathBuf>, max_depth: Option<usize>, settings: &Settings) -> Result<()> {
    let mut parser = CppParser::new()?;
    let request = ParseRequest::new(file).with_flags(settings.parser.flags.iter());
    let unit = parser
        .parse(&request)
        .with_context(|| format!("cannot parse {}", file.display()))?;

    for diagnostic in &unit.diagnostics {
        tracing::warn!(
            "[dump] {}:{}:{}: {}",
            file.display(),
            diagnostic.location.line,
            diagnostic.location.column,
            diagnostic.message
        );
    }

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(&path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    for record in records(&unit.ast, max_depth) {
        serde_json::to_writer(&mut writer, &record)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Pre-order records for every node owned by the tree. References are
/// reported by id, never followed.
pub fn records(ast: &Ast, max_depth: Option<usize>) -> Vec<NodeRecord<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![(ast.root(), None, 0usize)];

    while let Some((id, parent, depth)) = stack.pop() {
        let node = ast.node(id);
        let (ty, referenced) = match &node.data {
            NodeData::Decl(d) => (d.ty, None),
            NodeData::Stmt(s) => (s.ty, s.referenced),
            NodeData::Attr(_) => (None, None),
            NodeData::Ref(r) => (None, Some(r.referenced)),
        };

        out.push(NodeRecord {
            id,
            parent,
            depth,
            category: node.category(),
            kind: kind_name(node.kind()),
            spelling: &node.spelling,
            file: ast.file_path(node.location.file),
            line: node.location.line,
            column: node.location.column,
            ty: ty.map(|t| ast.type_spelling(t)),
            referenced,
        });

        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }
        for &child in ast.children(id).iter().rev() {
            stack.push((child, Some(id), depth + 1));
        }
    }

    out
}

fn kind_name(kind: NodeKind) -> String {
    match kind {
        NodeKind::Decl(k) => format!("{k:?}"),
        NodeKind::Stmt(k) => format!("{k:?}"),
        NodeKind::Attr(k) => format!("{k:?}"),
        NodeKind::Ref(k) => format!("{k:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> Ast {
        CppParser::new()
            .unwrap()
            .parse(&ParseRequest::new("main.cpp").with_contents(code))
            .unwrap()
            .ast
    }

    #[test]
    fn test_records_are_preorder() {
        let ast = parse("struct Widget { Widget(int x); };\n");
        let records = records(&ast, None);

        assert_eq!(records[0].kind, "TranslationUnit");
        assert_eq!(records[0].parent, None);
        assert_eq!(records[1].kind, "CxxRecord");
        assert_eq!(records[1].spelling, "Widget");
        assert_eq!(records[2].kind, "Constructor");
        assert_eq!(records[2].parent, Some(records[1].id));

        let param = records.iter().find(|r| r.kind == "ParmVar").unwrap();
        assert_eq!(param.spelling, "x");
        assert_eq!(param.ty, Some("int"));
        assert_eq!(param.depth, 3);
    }

    #[test]
    fn test_max_depth_limits_output() {
        let ast = parse("struct Widget { Widget(int x); };\n");
        let records = records(&ast, Some(1));
        assert!(records.iter().all(|r| r.depth <= 1));
        assert!(records.iter().any(|r| r.kind == "CxxRecord"));
        assert!(!records.iter().any(|r| r.kind == "Constructor"));
    }

    #[test]
    fn test_record_serializes_type_field() {
        let ast = parse("int count = 1;\n");
        let records = records(&ast, None);
        let var = records.iter().find(|r| r.kind == "Var").unwrap();
        let json = serde_json::to_value(var).unwrap();
        assert_eq!(json["type"], "int");
        assert_eq!(json["spelling"], "count");
        assert_eq!(json["category"], "Declaration");
    }
}
