use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::fragment::{
    BatchedQuery, ExpressionFragment, FilterFragment, FilterParameter, SourceFragment,
};
use super::target::{AttributeTarget, ExpressionTarget, FilterTarget, QueryOptions, Target};
use super::time::{self, TimeError};
use super::QueryResult;
use crate::metrics;
use crate::resource;
use crate::template::{TemplateVariables, VariableInterpolator};

const DEFAULT_AGGREGATION: &str = "AVERAGE";
const DEFAULT_INTERVAL_MS: i64 = 1000;

/// Combines every target of a panel into a single request
pub struct QueryBuilder<'a> {
    interpolator: VariableInterpolator<'a>,
    now: DateTime<Utc>,
}

impl<'a> QueryBuilder<'a> {
    /// Creates a builder resolving relative times against the current time
    pub fn new(variables: &'a TemplateVariables) -> Self {
        Self {
            interpolator: VariableInterpolator::new(variables),
            now: Utc::now(),
        }
    }

    /// Pins the instant that `now` refers to
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Builds the batched query, skipping incomplete targets
    pub fn build(&self, options: &QueryOptions) -> QueryResult<BatchedQuery> {
        let start = time::resolve(&options.range.from, self.now)?;
        let end = time::resolve_end(&options.range.to, self.now)?;
        if start > end {
            return Err(TimeError::InvertedRange { start, end }.into());
        }
        let span = end
            .checked_sub(start)
            .ok_or(TimeError::RangeTooLarge { start, end })?;

        let (step, maxrows) = match options.max_data_points.filter(|points| *points > 0) {
            Some(points) => {
                let divisor = i64::try_from(points).unwrap_or(i64::MAX);
                ((span / divisor).max(1), points)
            }
            None => {
                let step = interval_ms(options)?.max(1);
                (step, (span / step) as u64 + 1)
            }
        };

        let mut query = BatchedQuery {
            start,
            end,
            step,
            maxrows,
            source: Vec::new(),
            expression: Vec::new(),
            filter: Vec::new(),
        };

        for target in &options.targets {
            let added = match target {
                Target::Attribute(attribute) => match source_fragment(attribute) {
                    Some(source) => {
                        query.source.extend(self.interpolator.interpolate(&source)?);
                        true
                    }
                    None => false,
                },
                Target::Expression(expression) => match expression_fragment(expression) {
                    Some(expression) => {
                        query.expression.extend(self.interpolator.interpolate(&expression)?);
                        true
                    }
                    None => false,
                },
                Target::Filter(filter) => match filter_fragment(filter) {
                    Some(filter) => {
                        query.filter.push(filter);
                        true
                    }
                    None => false,
                },
                Target::Unknown => false,
            };

            if !added {
                debug!(kind = target.kind(), "Skipping incomplete target");
                metrics::record_skipped_target(target.kind());
            }
        }

        Ok(query)
    }
}

fn interval_ms(options: &QueryOptions) -> QueryResult<i64> {
    if let Some(ms) = options.interval_ms {
        return Ok(ms);
    }
    match &options.interval {
        Some(interval) => Ok(time::parse_interval(interval)?),
        None => Ok(DEFAULT_INTERVAL_MS),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn source_fragment(target: &AttributeTarget) -> Option<SourceFragment> {
    let node_id = non_empty(&target.node_id)?;
    let resource_id = non_empty(&target.resource_id)?;
    let attribute = non_empty(&target.attribute)?;

    Some(SourceFragment {
        aggregation: non_empty(&target.aggregation)
            .unwrap_or(DEFAULT_AGGREGATION)
            .to_string(),
        attribute: attribute.to_string(),
        label: non_empty(&target.label).unwrap_or(attribute).to_string(),
        resource_id: resource::resolve(node_id, resource_id),
        transient: target.hide,
        datasource: non_empty(&target.subattribute).map(str::to_string),
    })
}

fn expression_fragment(target: &ExpressionTarget) -> Option<ExpressionFragment> {
    Some(ExpressionFragment {
        label: non_empty(&target.label)?.to_string(),
        value: non_empty(&target.expression)?.to_string(),
        transient: target.hide,
    })
}

fn filter_fragment(target: &FilterTarget) -> Option<FilterFragment> {
    let definition = target.filter.as_ref().filter(|f| !f.name.is_empty())?;

    let parameter = target
        .filter_parameters
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) if s.is_empty() => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(FilterParameter {
                key: key.clone(),
                value,
            })
        })
        .collect();

    Some(FilterFragment {
        name: definition.name.clone(),
        parameter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::target::FilterDefinition;
    use crate::query::QueryError;
    use crate::template::{TemplateError, TemplateVariable};
    use serde_json::json;

    const START: i64 = 1424211730000;
    const END: i64 = 1424226130000;

    fn attribute(node_id: &str, resource_id: &str, attribute: &str) -> Target {
        Target::Attribute(AttributeTarget {
            node_id: Some(node_id.to_string()),
            resource_id: Some(resource_id.to_string()),
            attribute: Some(attribute.to_string()),
            aggregation: Some("AVERAGE".to_string()),
            ..Default::default()
        })
    }

    fn options() -> QueryOptions {
        QueryOptions::new(START, END).with_interval("1s")
    }

    #[test]
    fn test_single_attribute_target() {
        let variables = TemplateVariables::new();
        let options = options().with_target(attribute("1", "nodeSnmp[]", "loadavg1"));

        let query = QueryBuilder::new(&variables).build(&options).unwrap();
        assert_eq!(query.start, START);
        assert_eq!(query.end, END);
        assert_eq!(query.step, 1000);
        assert_eq!(query.maxrows, 14401);
        assert_eq!(
            query.source,
            vec![SourceFragment {
                aggregation: "AVERAGE".to_string(),
                attribute: "loadavg1".to_string(),
                label: "loadavg1".to_string(),
                resource_id: "node[1].nodeSnmp[]".to_string(),
                transient: false,
                datasource: None,
            }]
        );
    }

    #[test]
    fn test_step_from_max_data_points() {
        let variables = TemplateVariables::new();
        let options = QueryOptions::new(START, END)
            .with_interval("1s")
            .with_max_data_points(1000)
            .with_target(attribute("1", "nodeSnmp[]", "loadavg1"));

        let query = QueryBuilder::new(&variables).build(&options).unwrap();
        assert_eq!(query.step, 14400);
        assert_eq!(query.maxrows, 1000);
    }

    #[test]
    fn test_relative_range_resolved_against_now() {
        let variables = TemplateVariables::new();
        let now = DateTime::from_timestamp_millis(END).unwrap();
        let options = QueryOptions::new("now-1h", "now").with_interval("1m");

        let query = QueryBuilder::new(&variables).with_now(now).build(&options).unwrap();
        assert_eq!(query.start, END - 3_600_000);
        assert_eq!(query.end, END);
        assert_eq!(query.step, 60_000);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let variables = TemplateVariables::new();
        let options = QueryOptions::new(END, START);

        let result = QueryBuilder::new(&variables).build(&options);
        assert!(matches!(
            result,
            Err(QueryError::Time(TimeError::InvertedRange { .. }))
        ));
    }

    #[test]
    fn test_today_range_covers_whole_day() {
        let variables = TemplateVariables::new();
        let now = DateTime::from_timestamp_millis(END).unwrap();
        let options = QueryOptions::new("now/d", "now/d").with_interval("1h");

        let query = QueryBuilder::new(&variables).with_now(now).build(&options).unwrap();
        assert_eq!(query.start % 86_400_000, 0);
        assert_eq!(query.end, query.start + 86_400_000 - 1);
        assert_eq!(query.maxrows, 24);
    }

    #[test]
    fn test_overflowing_range_is_rejected() {
        let variables = TemplateVariables::new();
        let options = QueryOptions::new(i64::MIN, i64::MAX);

        let result = QueryBuilder::new(&variables).build(&options);
        assert!(matches!(
            result,
            Err(QueryError::Time(TimeError::RangeTooLarge { .. }))
        ));
    }

    #[test]
    fn test_unreadable_target_beside_valid_one() {
        let variables = TemplateVariables::new();
        let options: QueryOptions = serde_json::from_value(json!({
            "range": {"from": START, "to": END},
            "interval": "1s",
            "targets": [
                {"refId": "A"},
                {"type": "attribute", "nodeId": 2, "resourceId": "nodeSnmp[]",
                 "attribute": "loadavg5"}
            ]
        }))
        .unwrap();

        let query = QueryBuilder::new(&variables).build(&options).unwrap();
        assert_eq!(query.source.len(), 1);
        assert_eq!(query.source[0].resource_id, "node[2].nodeSnmp[]");
    }

    #[test]
    fn test_incomplete_targets_are_skipped() {
        let variables = TemplateVariables::new();
        let options = options()
            .with_target(Target::Attribute(AttributeTarget {
                node_id: Some("1".to_string()),
                attribute: Some("loadavg1".to_string()),
                ..Default::default()
            }))
            .with_target(attribute("", "nodeSnmp[]", "loadavg1"))
            .with_target(Target::Expression(ExpressionTarget {
                label: Some("x".to_string()),
                ..Default::default()
            }))
            .with_target(Target::Filter(FilterTarget::default()))
            .with_target(Target::Unknown)
            .with_target(attribute("2", "nodeSnmp[]", "loadavg5"));

        let query = QueryBuilder::new(&variables).build(&options).unwrap();
        assert_eq!(query.source.len(), 1);
        assert_eq!(query.source[0].attribute, "loadavg5");
        assert!(query.expression.is_empty());
        assert!(query.filter.is_empty());
    }

    #[test]
    fn test_no_valid_targets_is_empty() {
        let variables = TemplateVariables::new();
        let options = options().with_target(attribute("1", "", "loadavg1"));

        let query = QueryBuilder::new(&variables).build(&options).unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn test_hidden_target_is_transient_and_label_kept() {
        let variables = TemplateVariables::new();
        let options = options()
            .with_target(Target::Attribute(AttributeTarget {
                node_id: Some("FS:FID".to_string()),
                resource_id: Some("interfaceSnmp[eth0]".to_string()),
                attribute: Some("ifHCInOctets".to_string()),
                subattribute: Some("ifHCInOctets".to_string()),
                label: Some("octetsIn".to_string()),
                hide: true,
                ..Default::default()
            }))
            .with_target(Target::Expression(ExpressionTarget {
                label: Some("bitsIn".to_string()),
                expression: Some("octetsIn * 8".to_string()),
                hide: false,
            }));

        let query = QueryBuilder::new(&variables).build(&options).unwrap();
        let source = &query.source[0];
        assert_eq!(source.label, "octetsIn");
        assert_eq!(source.resource_id, "nodeSource[FS:FID].interfaceSnmp[eth0]");
        assert_eq!(source.datasource.as_deref(), Some("ifHCInOctets"));
        assert!(source.transient);
        assert_eq!(query.expression[0].value, "octetsIn * 8");
        assert!(!query.expression[0].transient);
    }

    #[test]
    fn test_node_variable_selects_addressing_scheme() {
        let variables =
            TemplateVariables::from(vec![TemplateVariable::multi("nodes", ["1", "2", "FS:FID"])]);
        let options = options().with_target(attribute("$nodes", "nodeSnmp[]", "loadavg1"));

        let query = QueryBuilder::new(&variables).build(&options).unwrap();
        let ids: Vec<&str> = query.source.iter().map(|s| s.resource_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "node[1].nodeSnmp[]",
                "node[2].nodeSnmp[]",
                "nodeSource[FS:FID].nodeSnmp[]"
            ]
        );
    }

    #[test]
    fn test_filters_drop_empty_parameters_and_accumulate() {
        let variables = TemplateVariables::new();
        let mut first = FilterTarget {
            filter: Some(FilterDefinition {
                name: "Chomp".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        first.filter_parameters.insert("cutLeadingNaNs".to_string(), json!("true"));
        first.filter_parameters.insert("cutoffDate".to_string(), json!(""));
        first.filter_parameters.insert("stripNaNs".to_string(), json!(null));
        first.filter_parameters.insert("window".to_string(), json!(5));

        let second = FilterTarget {
            filter: Some(FilterDefinition {
                name: "TrendLine".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = options()
            .with_target(Target::Filter(first))
            .with_target(Target::Filter(second));

        let query = QueryBuilder::new(&variables).build(&options).unwrap();
        assert_eq!(query.filter.len(), 2);
        assert_eq!(query.filter[0].name, "Chomp");
        assert_eq!(
            query.filter[0].parameter,
            vec![
                FilterParameter {
                    key: "cutLeadingNaNs".to_string(),
                    value: "true".to_string()
                },
                FilterParameter {
                    key: "window".to_string(),
                    value: "5".to_string()
                },
            ]
        );
        assert_eq!(query.filter[1].name, "TrendLine");
        assert!(query.filter[1].parameter.is_empty());
        assert!(!query.is_empty());
    }

    #[test]
    fn test_template_errors_propagate() {
        let variables = TemplateVariables::new();
        let options = options().with_target(attribute("1", "nodeSnmp[]", "${loadavg"));

        let result = QueryBuilder::new(&variables).build(&options);
        assert!(matches!(
            result,
            Err(QueryError::Template(TemplateError::MalformedReference(_)))
        ));
    }
}
