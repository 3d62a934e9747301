//! Rendering of effective constructors as signature-help entries.
//!
//! A [`Signature`] is the label shown to the user (`emplace_back(int x,
//! std::string y)`) plus one entry per parameter naming the character range
//! of that parameter inside the label, so an editor can highlight the active
//! argument.

pub mod trigger;

use crate::emplace::{EffectiveConstructor, Parameter};
use crate::types::Span;
use serde::{Deserialize, Serialize};

pub use trigger::TriggerAction;

/// How parameter ranges inside the label are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanPolicy {
    /// Record each range while the label is assembled.
    #[default]
    Tracked,
    /// Search the finished label for each parameter's text, left to right.
    /// Parameters whose text is not found after the previous match are left
    /// out of the signature.
    LegacySearch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureParameter {
    /// `type name`, or just `type` for an unnamed parameter
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub label: String,
    pub parameters: Vec<SignatureParameter>,
}

impl Signature {
    pub fn render(constructor: &EffectiveConstructor, policy: SpanPolicy) -> Self {
        match policy {
            SpanPolicy::Tracked => Self::render_tracked(constructor),
            SpanPolicy::LegacySearch => Self::render_searched(constructor),
        }
    }

    fn render_tracked(constructor: &EffectiveConstructor) -> Self {
        let mut label = format!("{}(", constructor.display_name);
        let mut parameters = Vec::with_capacity(constructor.parameters.len());

        for (i, parameter) in constructor.parameters.iter().enumerate() {
            if i > 0 {
                label.push_str(", ");
            }
            let text = parameter_text(parameter);
            parameters.push(SignatureParameter {
                span: Span::new(label.len(), text.len()),
                text: text.clone(),
            });
            label.push_str(&text);
        }
        label.push(')');

        Self { label, parameters }
    }

    fn render_searched(constructor: &EffectiveConstructor) -> Self {
        let texts: Vec<String> = constructor.parameters.iter().map(parameter_text).collect();
        let label = format!("{}({})", constructor.display_name, texts.join(", "));

        // The search covers the whole label, display name included
        let mut cursor = 0;
        let mut parameters = Vec::with_capacity(texts.len());
        for text in texts {
            let Some(offset) = label.get(cursor..).and_then(|rest| rest.find(&text)) else {
                tracing::trace!("[signature] parameter `{text}` not found in `{label}`");
                continue;
            };
            let span = Span::new(cursor + offset, text.len());
            cursor = span.end();
            parameters.push(SignatureParameter { text, span });
        }

        Self { label, parameters }
    }

    /// Index of the parameter being typed, given the text typed since the
    /// opening parenthesis. Counts commas and clamps to the last parameter.
    pub fn current_parameter(&self, applicable_text: &str) -> Option<usize> {
        let last = self.parameters.len().checked_sub(1)?;
        let commas = applicable_text.matches(',').count();
        Some(commas.min(last))
    }
}

fn parameter_text(parameter: &Parameter) -> String {
    if parameter.name.is_empty() {
        parameter.ty.clone()
    } else {
        format!("{} {}", parameter.ty, parameter.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctor(name: &str, params: &[(&str, &str)]) -> EffectiveConstructor {
        EffectiveConstructor {
            display_name: name.to_string(),
            parameters: params
                .iter()
                .map(|(ty, name)| Parameter::new(*ty, *name, false))
                .collect(),
        }
    }

    #[test]
    fn test_label_format() {
        let sig = Signature::render(
            &ctor("emplace_back", &[("int", "x"), ("std::string", "y")]),
            SpanPolicy::Tracked,
        );
        assert_eq!(sig.label, "emplace_back(int x, std::string y)");
        assert_eq!(sig.parameters[1].span.slice(&sig.label), Some("std::string y"));
    }

    #[test]
    fn test_empty_parameter_list() {
        let sig = Signature::render(&ctor("emplace", &[]), SpanPolicy::Tracked);
        assert_eq!(sig.label, "emplace()");
        assert!(sig.parameters.is_empty());
        assert_eq!(sig.current_parameter("1, 2"), None);
    }

    #[test]
    fn test_unnamed_parameter_renders_type_only() {
        let sig = Signature::render(&ctor("emplace", &[("const Widget &", "")]), SpanPolicy::Tracked);
        assert_eq!(sig.label, "emplace(const Widget &)");
        assert_eq!(sig.parameters[0].text, "const Widget &");
    }

    #[test]
    fn test_duplicate_parameter_text_gets_distinct_spans() {
        for policy in [SpanPolicy::Tracked, SpanPolicy::LegacySearch] {
            let sig = Signature::render(&ctor("emplace", &[("int", "x"), ("int", "x")]), policy);
            assert_eq!(sig.parameters.len(), 2);
            let (first, second) = (sig.parameters[0].span, sig.parameters[1].span);
            assert_eq!(first.slice(&sig.label), Some("int x"));
            assert_eq!(second.slice(&sig.label), Some("int x"));
            assert!(second.start >= first.end());
        }
    }

    #[test]
    fn test_policies_agree_on_ordinary_labels() {
        let c = ctor("emplace_back<T>", &[("T &&", "value"), ("double", "scale")]);
        assert_eq!(
            Signature::render(&c, SpanPolicy::Tracked),
            Signature::render(&c, SpanPolicy::LegacySearch)
        );
    }

    #[test]
    fn test_search_starts_at_label_start() {
        let c = ctor("emplace_back<T>", &[("T", "")]);

        let tracked = Signature::render(&c, SpanPolicy::Tracked);
        assert_eq!(tracked.parameters[0].span, Span::new(16, 1));

        // The first `T` in the label is the template argument
        let searched = Signature::render(&c, SpanPolicy::LegacySearch);
        assert_eq!(searched.label, "emplace_back<T>(T)");
        assert_eq!(searched.parameters[0].span, Span::new(13, 1));
    }

    #[test]
    fn test_current_parameter_clamps_to_last() {
        let sig = Signature::render(&ctor("emplace", &[("int", "a"), ("int", "b")]), SpanPolicy::Tracked);
        assert_eq!(sig.current_parameter(""), Some(0));
        assert_eq!(sig.current_parameter("1"), Some(0));
        assert_eq!(sig.current_parameter("1, "), Some(1));
        assert_eq!(sig.current_parameter("1, 2, 3"), Some(1));
    }
}
