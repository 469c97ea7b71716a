//! Template module for the query engine
//! Handles detection and expansion of dashboard template variable references.

pub mod cartesian;
pub mod interpolator;
pub mod variable;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

pub use interpolator::{Substitutable, VariableInterpolator};
pub use variable::{TemplateVariable, TemplateVariables, VariableOption, VariableValue};

/// Errors raised while substituting template variables
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Malformed template reference in '{0}'")]
    MalformedReference(String),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

// `${name}`, `${name:format}`, `[[name]]` and `$name`; the format suffix is ignored
static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(\w+)(?::[^}]*)?\}|\[\[(\w+)\]\]|\$(\w+)")
        .expect("token pattern is valid")
});

fn token_name<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

/// Returns the names of all variables referenced in `text`, in order of appearance
pub fn references(text: &str) -> TemplateResult<Vec<&str>> {
    let stripped = TOKEN.replace_all(text, "");
    if stripped.contains("${") || stripped.contains("[[") {
        return Err(TemplateError::MalformedReference(text.to_string()));
    }

    Ok(TOKEN.captures_iter(text).filter_map(|caps| token_name(&caps)).collect())
}

/// Replaces every reference to a bound variable; unknown references are kept verbatim
pub fn replace(text: &str, bindings: &HashMap<&str, &str>) -> String {
    TOKEN
        .replace_all(text, |caps: &Captures| {
            match token_name(caps).and_then(|name| bindings.get(name)) {
                Some(value) => (*value).to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
