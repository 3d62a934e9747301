//! Signature help queries over a single source file.
//!
//! [`SignatureService`] owns a parser backend plus the query options and runs
//! the whole pipeline: parse, walk for the target line, enumerate effective
//! constructors, render signatures.

use crate::config::Settings;
use crate::emplace::{EffectiveConstructor, QueryTarget, ResolverOptions, find_emplace_constructors};
use crate::parsing::{
    AstBackend, CppParser, DEFAULT_FLAGS, ParseError, ParseRequest, TranslationUnit,
};
use crate::signature::{Signature, SpanPolicy};
use crate::{debug_event, log_event};
use std::path::Path;

pub struct SignatureService<B: AstBackend = CppParser> {
    backend: B,
    options: ResolverOptions,
    span_policy: SpanPolicy,
    flags: Vec<String>,
}

impl SignatureService<CppParser> {
    /// Service over the tree-sitter backend with default options.
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self::with_backend(CppParser::new()?))
    }

    /// Service configured from the `query` and `parser` settings sections.
    pub fn from_settings(settings: &Settings) -> Result<Self, ParseError> {
        Ok(Self::new()?
            .with_options(settings.query.resolver_options())
            .with_span_policy(settings.query.span_policy)
            .with_flags(settings.parser.flags.clone()))
    }
}

impl<B: AstBackend> SignatureService<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            options: ResolverOptions::default(),
            span_policy: SpanPolicy::default(),
            flags: DEFAULT_FLAGS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_span_policy(mut self, policy: SpanPolicy) -> Self {
        self.span_policy = policy;
        self
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    pub fn span_policy(&self) -> SpanPolicy {
        self.span_policy
    }

    /// Parse `path`, using `contents` in place of the file on disk when given.
    pub fn parse(&mut self, path: &Path, contents: Option<&str>) -> Result<TranslationUnit, ParseError> {
        let mut request = ParseRequest::new(path).with_flags(self.flags.iter());
        if let Some(contents) = contents {
            request = request.with_contents(contents);
        }
        self.backend.parse(&request)
    }

    /// Effective constructors for emplace calls on `line` (1-based).
    ///
    /// Line 0 never matches anything.
    pub fn constructors(
        &mut self,
        path: &Path,
        contents: Option<&str>,
        line: u32,
    ) -> Result<Vec<EffectiveConstructor>, ParseError> {
        let unit = self.parse(path, contents)?;
        if unit.has_errors() {
            debug_event!(
                "service",
                "diagnostics",
                "{} has {} syntax problems, continuing",
                path.display(),
                unit.diagnostics.len()
            );
        }

        let Some(target) = QueryTarget::from_one_based(unit.file, line) else {
            return Ok(Vec::new());
        };
        let found = find_emplace_constructors(&unit.ast, target, self.options);
        log_event!(
            "service",
            "query",
            "{}:{} -> {} constructors",
            path.display(),
            line,
            found.len()
        );
        Ok(found)
    }

    /// Rendered signatures for emplace calls on `line` (1-based).
    pub fn signatures(
        &mut self,
        path: &Path,
        contents: Option<&str>,
        line: u32,
    ) -> Result<Vec<Signature>, ParseError> {
        let policy = self.span_policy;
        Ok(self
            .constructors(path, contents, line)?
            .iter()
            .map(|ctor| Signature::render(ctor, policy))
            .collect())
    }

    /// Like [`signatures`](Self::signatures), but a failed parse yields no
    /// signatures instead of an error.
    pub fn signatures_or_empty(&mut self, path: &Path, contents: Option<&str>, line: u32) -> Vec<Signature> {
        self.signatures(path, contents, line).unwrap_or_else(|e| {
            tracing::warn!("[service] no signatures for {}: {e}", path.display());
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emplace::IdentityPolicy;

    const SOURCE: &str = r#"
template <typename T>
class Container {
public:
    using value_type = T;
    void emplace_back();
};

class Widget {
    Widget(char c);
public:
    Widget(int a, int b = 0, int c = 0);
};

void fill() {
    Container<Widget> items;
    items.emplace_back(1);
}
"#;

    fn labels(signatures: &[Signature]) -> Vec<&str> {
        signatures.iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn test_signatures_for_emplace_line() {
        let mut service = SignatureService::new().unwrap();
        let signatures = service
            .signatures(Path::new("main.cpp"), Some(SOURCE), 17)
            .unwrap();
        assert_eq!(
            labels(&signatures),
            vec!["emplace_back(int a)", "emplace_back(int a, int b, int c)"]
        );
    }

    #[test]
    fn test_lenient_options_show_private_constructor() {
        let mut service = SignatureService::new()
            .unwrap()
            .with_options(ResolverOptions {
                check_access: false,
                identity: IdentityPolicy::TypeIdentity,
            });
        let signatures = service
            .signatures(Path::new("main.cpp"), Some(SOURCE), 17)
            .unwrap();
        assert_eq!(signatures.len(), 3);
        assert_eq!(signatures[0].label, "emplace_back(char c)");
    }

    #[test]
    fn test_other_lines_and_line_zero_are_empty() {
        let mut service = SignatureService::new().unwrap();
        let path = Path::new("main.cpp");
        assert!(service.signatures(path, Some(SOURCE), 16).unwrap().is_empty());
        assert!(service.signatures(path, Some(SOURCE), 0).unwrap().is_empty());
    }

    #[test]
    fn test_parse_failure_collapses_to_empty() {
        let mut service = SignatureService::new().unwrap();
        let path = Path::new("/nonexistent/emplace-sense/main.cpp");
        assert!(service.signatures(path, None, 1).is_err());
        assert!(service.signatures_or_empty(path, None, 1).is_empty());
    }

    #[test]
    fn test_from_settings_applies_query_section() {
        let mut settings = Settings::default();
        settings.query.check_access = false;
        settings.query.span_policy = SpanPolicy::LegacySearch;

        let service = SignatureService::from_settings(&settings).unwrap();
        assert!(!service.options().check_access);
        assert_eq!(service.span_policy(), SpanPolicy::LegacySearch);
    }
}
