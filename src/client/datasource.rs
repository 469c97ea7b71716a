use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::ClientConfig;
use super::models::{DatasourceStatus, MetricFindValue, NodeList, Resource};
use super::request::{BackoffPolicy, RequestClient};
use super::transport::{HttpTransport, Transport};
use crate::error::DatasourceResult;
use crate::metrics;
use crate::query::target::FilterDefinition;
use crate::query::{QueryBuilder, QueryOptions};
use crate::resource;
use crate::response::{self, MeasurementsResponse, SeriesResult};
use crate::template::{TemplateVariables, VariableInterpolator};

static NODE_FILTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"nodeFilter\((.*)\)").expect("nodeFilter pattern is valid"));
static NODE_RESOURCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"nodeResources\((.*)\)").expect("nodeResources pattern is valid"));

/// Entry point used by dashboards to query an OpenNMS instance
#[derive(Debug, Clone)]
pub struct Datasource<T = HttpTransport> {
    client: RequestClient<T>,
    search_limit: u32,
}

impl Datasource<HttpTransport> {
    pub fn new(config: &ClientConfig) -> DatasourceResult<Self> {
        Ok(Self::with_transport(HttpTransport::new(config)?, config))
    }
}

impl<T: Transport> Datasource<T> {
    pub fn with_transport(transport: T, config: &ClientConfig) -> Self {
        Self {
            client: RequestClient::new(transport, BackoffPolicy::from_config(config)),
            search_limit: config.search_limit,
        }
    }

    pub fn transport(&self) -> &T {
        self.client.transport()
    }

    /// Runs every target of a panel as a single measurements request
    pub async fn query(
        &self,
        options: &QueryOptions,
        variables: &TemplateVariables,
    ) -> DatasourceResult<Vec<SeriesResult>> {
        let started = Instant::now();
        let query = QueryBuilder::new(variables).build(options)?;

        if query.is_empty() {
            debug!("No valid targets, skipping measurements request");
            metrics::record_empty_query();
            return Ok(Vec::new());
        }

        debug!(
            sources = query.source.len(),
            expressions = query.expression.len(),
            filters = query.filter.len(),
            step = query.step,
            "Sending measurements request"
        );
        let body = self
            .client
            .send(Method::POST, "/rest/measurements", Some(serde_json::to_value(&query)?))
            .await?;
        let response: MeasurementsResponse = decode(body)?;
        let series = response::parse(&response);

        let points = series.iter().map(|s| s.points.len()).sum();
        metrics::record_series(series.len(), points);
        metrics::record_query(started.elapsed().as_secs_f64() * 1000.0);
        Ok(series)
    }

    /// Probes `/rest/info`
    pub async fn test_datasource(&self) -> DatasourceResult<DatasourceStatus> {
        self.client.send(Method::GET, "/rest/info", None).await?;
        info!("Datasource is reachable");
        Ok(DatasourceStatus::success())
    }

    /// Resolves a template variable query.
    ///
    /// Supports `nodeFilter(<filter rule>)` and `nodeResources(<node>)`; anything else
    /// yields no values.
    pub async fn metric_find_query(
        &self,
        query: &str,
        variables: &TemplateVariables,
    ) -> DatasourceResult<Vec<MetricFindValue>> {
        let interpolated = VariableInterpolator::new(variables).replace_current(query)?;

        if let Some(caps) = NODE_FILTER.captures(&interpolated) {
            return self.find_nodes(&caps[1]).await;
        }
        if let Some(caps) = NODE_RESOURCES.captures(&interpolated) {
            return self.find_node_resources(&caps[1]).await;
        }

        Ok(Vec::new())
    }

    async fn find_nodes(&self, filter_rule: &str) -> DatasourceResult<Vec<MetricFindValue>> {
        let path = format!("/rest/nodes?filterRule={}", urlencoding::encode(filter_rule));
        let nodes: NodeList = self.get(&path, None).await?;

        if nodes.is_truncated() {
            warn!(
                total = nodes.total_count,
                returned = nodes.count,
                "Node filter matched more nodes than were returned"
            );
        }

        Ok(nodes
            .node
            .iter()
            .map(|node| MetricFindValue::expandable(node.criteria()))
            .collect())
    }

    async fn find_node_resources(&self, node_id: &str) -> DatasourceResult<Vec<MetricFindValue>> {
        let path = format!(
            "/rest/resources/{}",
            urlencoding::encode(&resource::node_resource(node_id))
        );
        let node: Resource = self.get(&path, Some(json!({"depth": 1}))).await?;

        Ok(node
            .children()
            .iter()
            .filter_map(|child| resource::strip_node_prefix(&child.id))
            .map(MetricFindValue::expandable)
            .collect())
    }

    /// Free-text search across node labels, names, addresses and foreign ids
    pub async fn search_for_nodes(&self, query: &str) -> DatasourceResult<NodeList> {
        let contains = format!("%{}%", query);
        let params = json!({
            "limit": self.search_limit,
            "match": "any",
            "comparator": "ilike",
            "orderBy": "id",
            "order": "asc",
            "label": contains,
            "sysName": contains,
            "ipInterface.ipAddress": contains,
            "ipInterface.ipHostName": contains,
            // no leading wildcard support on foreign ids
            "foreignId": format!("{}%", query),
        });
        self.get("/rest/nodes", Some(params)).await
    }

    /// Filters the server can apply to measurement results
    pub async fn available_filters(&self) -> DatasourceResult<Vec<FilterDefinition>> {
        self.get("/rest/measurements/filters", None).await
    }

    /// Graph attributes of a node resource whose name contains `query`, sorted
    pub async fn suggest_attributes(
        &self,
        node_id: &str,
        resource_id: &str,
        query: &str,
    ) -> DatasourceResult<Vec<String>> {
        let path = format!(
            "/rest/resources/{}",
            urlencoding::encode(&resource::resolve(node_id, resource_id))
        );
        let found: Resource = self.get(&path, Some(json!({"depth": -1}))).await?;

        let needle = query.to_lowercase();
        let mut attributes: Vec<String> = found
            .rrd_graph_attributes
            .keys()
            .filter(|name| name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        attributes.sort();
        Ok(attributes)
    }

    /// Every resource of a node that has at least one graph attribute
    pub async fn resources_with_attributes_for_node(
        &self,
        node_id: &str,
    ) -> DatasourceResult<Vec<Resource>> {
        let path = format!("/rest/resources/fornode/{}", urlencoding::encode(node_id));
        let root: Resource = self.get(&path, Some(json!({"depth": -1}))).await?;
        Ok(root.flatten_with_attributes())
    }

    async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<Value>,
    ) -> DatasourceResult<R> {
        let body = self.client.send(Method::GET, path, params).await?;
        decode(body)
    }
}

/// Decodes a response body, treating an empty body as an empty object
fn decode<R: DeserializeOwned>(body: Value) -> DatasourceResult<R> {
    let body = if body.is_null() { json!({}) } else { body };
    Ok(serde_json::from_value(body)?)
}
