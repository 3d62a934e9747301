//! When signature help opens and closes while the user types.

use crate::emplace::EMPLACE_METHODS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Open signature help.
    Trigger,
    /// Close any open signature help.
    Dismiss,
}

impl TriggerAction {
    /// Decide what typing `typed` after `line_prefix` does.
    ///
    /// `(` right after the word `emplace` or `emplace_back` triggers; `)`
    /// dismisses. Whitespace between the word and the parenthesis is allowed.
    pub fn for_typed_char(line_prefix: &str, typed: char) -> Option<Self> {
        match typed {
            '(' if EMPLACE_METHODS.contains(&trailing_word(line_prefix)) => Some(Self::Trigger),
            ')' => Some(Self::Dismiss),
            _ => None,
        }
    }
}

fn trailing_word(text: &str) -> &str {
    let text = text.trim_end();
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map_or(text.len(), |(i, _)| i);
    &text[start..]
}
