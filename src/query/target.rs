use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// One row of a panel's query editor
///
/// Deserialization never fails: a row that is untagged or does not match the
/// shape of its kind becomes [`Target::Unknown`] and is skipped by the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Attribute(AttributeTarget),
    Expression(ExpressionTarget),
    Filter(FilterTarget),
    /// Rows of a kind this engine does not understand
    Unknown,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedTarget {
    Attribute(AttributeTarget),
    Expression(ExpressionTarget),
    Filter(FilterTarget),
    #[serde(other)]
    Unknown,
}

impl From<TaggedTarget> for Target {
    fn from(tagged: TaggedTarget) -> Self {
        match tagged {
            TaggedTarget::Attribute(target) => Target::Attribute(target),
            TaggedTarget::Expression(target) => Target::Expression(target),
            TaggedTarget::Filter(target) => Target::Filter(target),
            TaggedTarget::Unknown => Target::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value::<TaggedTarget>(value)
            .map(Target::from)
            .unwrap_or_else(|e| {
                debug!(error = %e, "Unreadable target");
                Target::Unknown
            }))
    }
}

impl Target {
    /// Short name used in logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Attribute(_) => "attribute",
            Target::Expression(_) => "expression",
            Target::Filter(_) => "filter",
            Target::Unknown => "unknown",
        }
    }
}

/// Reference to a stored attribute of a node resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeTarget {
    #[serde(deserialize_with = "optional_id")]
    pub node_id: Option<String>,
    pub resource_id: Option<String>,
    pub attribute: Option<String>,
    pub aggregation: Option<String>,
    /// Datasource inside the attribute's storage file
    pub subattribute: Option<String>,
    pub label: Option<String>,
    pub hide: bool,
}

/// Node ids arrive as strings or numbers depending on the editor
fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Derived series computed on the server from other labels
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExpressionTarget {
    pub label: Option<String>,
    pub expression: Option<String>,
    pub hide: bool,
}

/// Server-side filter applied to the whole result set
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterTarget {
    pub filter: Option<FilterDefinition>,
    /// Parameter name to value, in editor order
    pub filter_parameters: Map<String, Value>,
}

/// A filter supported by the server, as listed by `/rest/measurements/filters`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterDefinition {
    pub name: String,
    pub description: Option<String>,
    pub backend: Option<String>,
    pub canonical_name: Option<String>,
    pub parameter: Vec<FilterParameterDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterParameterDefinition {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<String>,
}

/// A point in time: epoch milliseconds or an expression such as `now-1h`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    Millis(i64),
    Expr(String),
}

impl From<i64> for TimeSpec {
    fn from(ms: i64) -> Self {
        Self::Millis(ms)
    }
}

impl From<&str> for TimeSpec {
    fn from(expr: &str) -> Self {
        Self::Expr(expr.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RangeSpec {
    pub from: TimeSpec,
    pub to: TimeSpec,
}

/// Everything the panel hands over for a single query
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub range: RangeSpec,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub interval_ms: Option<i64>,
    #[serde(default)]
    pub max_data_points: Option<u64>,
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl QueryOptions {
    pub fn new(from: impl Into<TimeSpec>, to: impl Into<TimeSpec>) -> Self {
        Self {
            range: RangeSpec {
                from: from.into(),
                to: to.into(),
            },
            interval: None,
            interval_ms: None,
            max_data_points: None,
            targets: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: &str) -> Self {
        self.interval = Some(interval.to_string());
        self
    }

    pub fn with_max_data_points(mut self, points: u64) -> Self {
        self.max_data_points = Some(points);
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }
}
