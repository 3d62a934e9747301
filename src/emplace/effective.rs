//! Default-argument arity expansion.

use serde::Serialize;

/// One constructor parameter as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub has_default: bool,
}

impl Parameter {
    pub fn new(ty: impl Into<String>, name: impl Into<String>, has_default: bool) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            has_default,
        }
    }
}

/// A constructor paired with one callable arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConstructor {
    pub display_name: String,
    pub parameters: Vec<Parameter>,
}

/// Expand a parameter list into the arities offered as candidates.
///
/// The first defaulted parameter produces one shortened candidate made of the
/// parameters before it; the full list is always produced last. Later
/// defaults do not add more candidates, so the result has one or two
/// entries.
pub fn effective_constructors(display_name: &str, parameters: &[Parameter]) -> Vec<EffectiveConstructor> {
    let mut found = Vec::with_capacity(2);

    let mut prefix = Vec::with_capacity(parameters.len());
    let mut shortened = false;
    for parameter in parameters {
        if !shortened && parameter.has_default {
            found.push(EffectiveConstructor {
                display_name: display_name.to_string(),
                parameters: prefix.clone(),
            });
            shortened = true;
        }
        prefix.push(parameter.clone());
    }

    found.push(EffectiveConstructor {
        display_name: display_name.to_string(),
        parameters: prefix,
    });
    found
}
