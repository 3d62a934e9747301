//! C++ parser implementation

use super::flags::CompileFlags;
use super::lower::Lowerer;
use crate::ast::AstBuilder;
use crate::debug_event;
use crate::parsing::{AstBackend, ParseError, ParseRequest, TranslationUnit};
use tree_sitter::Parser;

pub struct CppParser {
    parser: Parser,
}

impl std::fmt::Debug for CppParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CppParser")
            .field("language", &"C++")
            .finish()
    }
}

impl CppParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .map_err(|e| ParseError::LanguageSetup(e.to_string()))?;

        Ok(Self { parser })
    }
}

impl AstBackend for CppParser {
    fn parse(&mut self, request: &ParseRequest) -> Result<TranslationUnit, ParseError> {
        let flags = CompileFlags::from_args(&request.flags)?;
        let code = request.source()?;

        let tree = self
            .parser
            .parse(&code, None)
            .ok_or_else(|| ParseError::ParseFailed {
                path: request.path.clone(),
            })?;

        let builder = AstBuilder::new(&request.path);
        let file = builder.main_file();
        let mut lowerer = Lowerer::new(builder, &mut self.parser, flags.include_dirs);
        lowerer.lower_main(&tree, &code, &request.path);
        let (ast, diagnostics) = lowerer.finish();

        debug_event!(
            "parser",
            "parsed",
            "{} ({} nodes, {} diagnostics)",
            request.path.display(),
            ast.len(),
            diagnostics.len()
        );

        Ok(TranslationUnit {
            ast,
            file,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Access, Ast, DeclKind, NodeId, NodeKind, RefKind, StmtKind};

    fn parse(code: &str) -> TranslationUnit {
        let mut parser = CppParser::new().unwrap();
        parser
            .parse(&ParseRequest::new("main.cpp").with_contents(code))
            .unwrap()
    }

    fn find_all(ast: &Ast, pred: impl Fn(NodeId) -> bool) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![ast.root()];
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if pred(id) {
                found.push(id);
            }
            stack.extend(ast.children(id).iter().rev());
        }
        found
    }

    fn find_decl(ast: &Ast, kind: DeclKind, name: &str) -> NodeId {
        find_all(ast, |id| {
            let node = ast.node(id);
            node.is_decl_kind(kind) && node.spelling == name
        })
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no {kind:?} named {name}"))
    }

    #[test]
    fn test_parser_creation() {
        assert!(CppParser::new().is_ok());
    }

    #[test]
    fn test_class_access_and_constructors() {
        let tu = parse(
            r#"
class Widget {
    Widget(char c);
public:
    Widget(int a, int b = 0);
    Widget(const Widget &) = delete;
    [[deprecated]] explicit Widget(double scale) {}
};
"#,
        );
        let ast = &tu.ast;
        let widget = find_decl(ast, DeclKind::CxxRecord, "Widget");
        let ctors: Vec<NodeId> = ast
            .children(widget)
            .iter()
            .copied()
            .filter(|&c| ast.node(c).is_decl_kind(DeclKind::Constructor))
            .collect();
        assert_eq!(ctors.len(), 4);

        let data = |id: NodeId| ast.node(id).as_decl().unwrap().clone();
        assert_eq!(data(ctors[0]).access, Access::Private);
        assert_eq!(data(ctors[1]).access, Access::Public);
        assert!(data(ctors[2]).is_deleted);
        assert!(data(ctors[3]).has_body);

        let params: Vec<NodeId> = ast.children(ctors[1]).to_vec();
        assert_eq!(ast.node(params[0]).spelling, "a");
        assert!(!data(params[0]).has_default_arg);
        assert!(data(params[1]).has_default_arg);

        let copy_param = ast.children(ctors[2])[0];
        assert_eq!(ast.node(copy_param).spelling, "");
        assert_eq!(ast.type_spelling(data(copy_param).ty.unwrap()), "const Widget &");

        assert!(
            ast.first_child_of_kind(ctors[3], NodeKind::Attr(crate::ast::AttrKind::Deprecated))
                .is_some()
        );
    }

    #[test]
    fn test_class_template_with_value_type() {
        let tu = parse(
            r#"
template <typename T, typename Alloc = int>
struct Container {
    using value_type = T;
    Container(const T &first);
};
"#,
        );
        let ast = &tu.ast;
        let container = find_decl(ast, DeclKind::ClassTemplate, "Container");
        let params = ast.node(container).as_decl().unwrap().template_params.clone();
        assert_eq!(params.len(), 2);
        assert!(ast.node(params[1]).as_decl().unwrap().default_type.is_some());

        let alias = find_decl(ast, DeclKind::TypeAlias, "value_type");
        let children = ast.children(alias);
        assert_eq!(children.len(), 1);
        let reference = ast.node(children[0]).as_ref_data().unwrap();
        assert_eq!(reference.kind, RefKind::TypeRef);
        assert_eq!(reference.referenced, params[0]);
        assert_eq!(
            ast.node(alias).as_decl().unwrap().ty,
            ast.node(params[0]).as_decl().unwrap().ty
        );
    }

    #[test]
    fn test_member_call_structure() {
        let tu = parse(
            r#"
template <typename T> struct Container { using value_type = T; };
struct Widget { Widget(int x); };

void fill() {
    Container<Widget> items;
    items.emplace_back(1);
}
"#,
        );
        let ast = &tu.ast;
        let calls = find_all(ast, |id| {
            ast.node(id).kind() == NodeKind::Stmt(StmtKind::CxxMemberCallExpr)
        });
        assert_eq!(calls.len(), 1);
        let call = ast.node(calls[0]);
        assert_eq!(call.spelling, "emplace_back");
        assert_eq!(call.location.line, 7);

        let member = ast
            .first_child_of_kind(calls[0], NodeKind::Stmt(StmtKind::MemberRefExpr))
            .unwrap();
        let receiver = ast
            .first_child_of_kind(member, NodeKind::Stmt(StmtKind::DeclRefExpr))
            .unwrap();
        let items = ast.node(receiver).as_stmt().unwrap().referenced.unwrap();
        assert!(ast.node(items).is_decl_kind(DeclKind::Var));
        assert!(
            ast.first_child_of_kind(items, NodeKind::Ref(RefKind::TemplateRef))
                .is_some()
        );

        let ty = ast.node(receiver).as_stmt().unwrap().ty.unwrap();
        assert_eq!(ast.type_spelling(ty), "Container<Widget>");
    }

    #[test]
    fn test_namespaces_resolve_qualified_types() {
        let tu = parse(
            r#"
namespace geo { struct Point { Point(double x, double y); }; }
namespace geo { using Coord = double; }
geo::Point origin(0.0, 0.0);
geo::Coord scale = 1.0;
"#,
        );
        let ast = &tu.ast;
        let origin = find_decl(ast, DeclKind::Var, "origin");
        let ty = ast.node(origin).as_decl().unwrap().ty.unwrap();
        assert_eq!(ast.type_spelling(ty), "geo::Point");
        let point = find_decl(ast, DeclKind::CxxRecord, "Point");
        assert_eq!(ast.types().record_decl(ast.types().canonical(ty)), Some(point));

        let scale = find_decl(ast, DeclKind::Var, "scale");
        let ty = ast.node(scale).as_decl().unwrap().ty.unwrap();
        assert_eq!(ast.type_spelling(ast.types().canonical(ty)), "double");
    }

    #[test]
    fn test_syntax_errors_become_diagnostics() {
        let tu = parse("struct Widget { Widget(int x) };\nint main( {\n");
        assert!(tu.has_errors());
        assert!(tu.diagnostics.iter().all(|d| d.location.file == tu.file));
        find_decl(&tu.ast, DeclKind::CxxRecord, "Widget");
    }

    #[test]
    fn test_unsupported_flag_fails_parse() {
        let mut parser = CppParser::new().unwrap();
        let request = ParseRequest::new("main.c")
            .with_contents("int x;")
            .with_flags(["-xc"]);
        assert!(matches!(
            parser.parse(&request),
            Err(ParseError::UnsupportedFlag { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut parser = CppParser::new().unwrap();
        let request = ParseRequest::new("/nonexistent/emplace-sense/main.cpp");
        assert!(matches!(parser.parse(&request), Err(ParseError::Io { .. })));
    }
}
