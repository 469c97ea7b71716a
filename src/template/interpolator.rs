use std::collections::HashMap;

use super::cartesian;
use super::variable::{TemplateVariable, TemplateVariables};
use super::{references, replace, TemplateResult};

/// A query fragment with a fixed set of fields eligible for variable substitution
pub trait Substitutable: Clone {
    /// The current contents of every substitutable field
    fn substitutable_fields(&self) -> Vec<&str>;

    /// Structural copy with `f` applied to every substitutable field
    fn map_fields<F: FnMut(&str) -> String>(&self, f: F) -> Self;

    /// Hook run on each copy once substitution is complete
    fn after_substitution(&mut self) {}
}

/// Expands fragments across the values of the template variables they reference
#[derive(Debug, Clone, Copy)]
pub struct VariableInterpolator<'a> {
    variables: &'a TemplateVariables,
}

impl<'a> VariableInterpolator<'a> {
    pub fn new(variables: &'a TemplateVariables) -> Self {
        Self { variables }
    }

    /// Variables referenced by any substitutable field, in declaration order
    pub fn referenced_variables<F: Substitutable>(
        &self,
        fragment: &F,
    ) -> TemplateResult<Vec<&'a TemplateVariable>> {
        let mut names = Vec::new();
        for field in fragment.substitutable_fields() {
            names.extend(references(field)?);
        }

        Ok(self
            .variables
            .iter()
            .filter(|variable| names.contains(&variable.name.as_str()))
            .collect())
    }

    /// Returns one fragment per combination of the referenced variables' values
    pub fn interpolate<F: Substitutable>(&self, fragment: &F) -> TemplateResult<Vec<F>> {
        let referenced = self.referenced_variables(fragment)?;
        if referenced.is_empty() {
            return Ok(vec![fragment.clone()]);
        }

        let value_lists: Vec<Vec<String>> = referenced.iter().map(|v| v.values()).collect();
        let combinations = cartesian::expand(&value_lists);

        let mut fragments = Vec::with_capacity(combinations.len());
        for row in &combinations {
            let bindings: HashMap<&str, &str> = referenced
                .iter()
                .zip(row)
                .map(|(variable, value)| (variable.name.as_str(), value.as_str()))
                .collect();

            let mut copy = fragment.map_fields(|field| replace(field, &bindings));
            copy.after_substitution();
            fragments.push(copy);
        }

        Ok(fragments)
    }

    /// Replaces every known variable in `text` with its current selection.
    ///
    /// Several values are rendered as a `{a,b}` glob.
    pub fn replace_current(&self, text: &str) -> TemplateResult<String> {
        let names = references(text)?;
        let rendered: Vec<(&str, String)> = self
            .variables
            .iter()
            .filter(|variable| names.contains(&variable.name.as_str()))
            .map(|variable| {
                let values = variable.values();
                let value = match values.as_slice() {
                    [single] => single.clone(),
                    many => format!("{{{}}}", many.join(",")),
                };
                (variable.name.as_str(), value)
            })
            .collect();

        let bindings: HashMap<&str, &str> = rendered
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        Ok(replace(text, &bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fragment::{ExpressionFragment, SourceFragment};
    use crate::template::{TemplateError, VariableOption};

    fn source(resource_id: &str, attribute: &str) -> SourceFragment {
        SourceFragment {
            aggregation: "AVERAGE".to_string(),
            attribute: attribute.to_string(),
            label: attribute.to_string(),
            resource_id: resource_id.to_string(),
            transient: false,
            datasource: None,
        }
    }

    #[test]
    fn test_no_references_returns_fragment_unchanged() {
        let variables = TemplateVariables::from(vec![TemplateVariable::single("v", "x")]);
        let interpolator = VariableInterpolator::new(&variables);
        let fragment = source("node[1].nodeSnmp[]", "loadavg1");

        let result = interpolator.interpolate(&fragment).unwrap();
        assert_eq!(result, vec![fragment]);
    }

    #[test]
    fn test_single_value_substitution() {
        let variables =
            TemplateVariables::from(vec![TemplateVariable::single("variable", "loadavg1")]);
        let interpolator = VariableInterpolator::new(&variables);

        let result = interpolator
            .interpolate(&source("node[1].nodeSnmp[]", "$variable"))
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].attribute, "loadavg1");
        // label was copied from the attribute before substitution
        assert_eq!(result[0].label, "loadavg1");
    }

    #[test]
    fn test_multi_valued_variables_expand_in_order() {
        let variables = TemplateVariables::from(vec![
            TemplateVariable::multi("v1", ["1", "2"]),
            TemplateVariable::multi("v2", ["x", "y"]),
        ]);
        let interpolator = VariableInterpolator::new(&variables);

        let result = interpolator
            .interpolate(&source("node[1].nodeSnmp[]", "$v1-$v2"))
            .unwrap();
        let attributes: Vec<&str> = result.iter().map(|s| s.attribute.as_str()).collect();
        assert_eq!(attributes, vec!["1-x", "1-y", "2-x", "2-y"]);
    }

    #[test]
    fn test_declaration_order_wins_over_reference_order() {
        let variables = TemplateVariables::from(vec![
            TemplateVariable::multi("v1", ["1", "2"]),
            TemplateVariable::multi("v2", ["x", "y"]),
        ]);
        let interpolator = VariableInterpolator::new(&variables);

        let result = interpolator
            .interpolate(&source("node[1].nodeSnmp[]", "$v2-$v1"))
            .unwrap();
        let attributes: Vec<&str> = result.iter().map(|s| s.attribute.as_str()).collect();
        assert_eq!(attributes, vec!["x-1", "y-1", "x-2", "y-2"]);
    }

    #[test]
    fn test_node_prefix_is_repaired_after_substitution() {
        let variables =
            TemplateVariables::from(vec![TemplateVariable::multi("nodes", ["1", "FS:FID"])]);
        let interpolator = VariableInterpolator::new(&variables);

        let result = interpolator
            .interpolate(&source("node[$nodes].nodeSnmp[]", "loadavg1"))
            .unwrap();
        assert_eq!(result[0].resource_id, "node[1].nodeSnmp[]");
        assert_eq!(result[1].resource_id, "nodeSource[FS:FID].nodeSnmp[]");
    }

    #[test]
    fn test_all_selection_uses_options() {
        let variables = TemplateVariables::from(vec![TemplateVariable::all(
            "attr",
            vec![
                VariableOption::new("All", "$__all"),
                VariableOption::new("loadavg1", "loadavg1"),
                VariableOption::new("loadavg5", "loadavg5"),
            ],
        )]);
        let interpolator = VariableInterpolator::new(&variables);

        let expression = ExpressionFragment {
            label: "double_${attr}".to_string(),
            value: "${attr} * 2".to_string(),
            transient: false,
        };
        let result = interpolator.interpolate(&expression).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].label, "double_loadavg1");
        assert_eq!(result[1].value, "loadavg5 * 2");
    }

    #[test]
    fn test_malformed_reference_is_an_error() {
        let variables = TemplateVariables::new();
        let interpolator = VariableInterpolator::new(&variables);

        let result = interpolator.interpolate(&source("node[1].nodeSnmp[]", "${broken"));
        assert!(matches!(result, Err(TemplateError::MalformedReference(_))));
    }

    #[test]
    fn test_replace_current_formats_multi_values_as_glob() {
        let variables = TemplateVariables::from(vec![
            TemplateVariable::single("node", "2"),
            TemplateVariable::multi("cats", ["Production", "Linux"]),
        ]);
        let interpolator = VariableInterpolator::new(&variables);

        assert_eq!(
            interpolator.replace_current("nodeResources($node)").unwrap(),
            "nodeResources(2)"
        );
        assert_eq!(
            interpolator.replace_current("cat $cats $other").unwrap(),
            "cat {Production,Linux} $other"
        );
    }
}
