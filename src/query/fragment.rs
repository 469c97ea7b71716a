use serde::{Deserialize, Serialize};

use crate::resource;
use crate::template::Substitutable;

/// A `source` entry of the measurements request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFragment {
    pub aggregation: String,
    pub attribute: String,
    pub label: String,
    pub resource_id: String,
    pub transient: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
}

impl Substitutable for SourceFragment {
    fn substitutable_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.resource_id.as_str(),
            self.attribute.as_str(),
            self.label.as_str(),
        ];
        if let Some(datasource) = &self.datasource {
            fields.push(datasource);
        }
        fields
    }

    fn map_fields<F: FnMut(&str) -> String>(&self, mut f: F) -> Self {
        Self {
            aggregation: self.aggregation.clone(),
            attribute: f(&self.attribute),
            label: f(&self.label),
            resource_id: f(&self.resource_id),
            transient: self.transient,
            datasource: self.datasource.as_deref().map(&mut f),
        }
    }

    fn after_substitution(&mut self) {
        // a variable in the node field may have injected a foreign-source pair
        self.resource_id = resource::repair_node_prefix(&self.resource_id);
    }
}

/// An `expression` entry of the measurements request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionFragment {
    pub label: String,
    pub value: String,
    pub transient: bool,
}

impl Substitutable for ExpressionFragment {
    fn substitutable_fields(&self) -> Vec<&str> {
        vec![self.value.as_str(), self.label.as_str()]
    }

    fn map_fields<F: FnMut(&str) -> String>(&self, mut f: F) -> Self {
        Self {
            label: f(&self.label),
            value: f(&self.value),
            transient: self.transient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParameter {
    pub key: String,
    pub value: String,
}

/// A `filter` entry of the measurements request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFragment {
    pub name: String,
    pub parameter: Vec<FilterParameter>,
}

/// The single request body sent for a whole panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchedQuery {
    pub start: i64,
    pub end: i64,
    pub step: i64,
    pub maxrows: u64,
    pub source: Vec<SourceFragment>,
    pub expression: Vec<ExpressionFragment>,
    /// Omitted when empty, servers before 17.0.0 reject the attribute
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FilterFragment>,
}

impl BatchedQuery {
    /// Returns true when nothing survived target validation
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.expression.is_empty() && self.filter.is_empty()
    }
}
