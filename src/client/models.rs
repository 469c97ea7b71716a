use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A monitored node as returned by `/rest/nodes`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub label: Option<String>,
    pub foreign_source: Option<String>,
    pub foreign_id: Option<String>,
}

impl Node {
    /// Identifier usable as a node criteria: `fs:fid` when both parts are known
    pub fn criteria(&self) -> String {
        match (&self.foreign_source, &self.foreign_id) {
            (Some(fs), Some(fid)) => format!("{}:{}", fs, fid),
            _ => self.id.clone(),
        }
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeList {
    pub count: Option<u64>,
    pub total_count: Option<u64>,
    pub offset: Option<u64>,
    pub node: Vec<Node>,
}

impl NodeList {
    /// Returns true when the server matched more nodes than it returned
    pub fn is_truncated(&self) -> bool {
        matches!((self.count, self.total_count), (Some(count), Some(total)) if count < total)
    }
}

/// A node or one of its measurable children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    pub id: String,
    pub label: Option<String>,
    pub name: Option<String>,
    pub type_label: Option<String>,
    pub parent_id: Option<String>,
    pub link: Option<String>,
    pub children: Option<ResourceChildren>,
    pub rrd_graph_attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceChildren {
    pub count: Option<u64>,
    pub total_count: Option<u64>,
    pub resource: Vec<Resource>,
}

impl Resource {
    pub fn children(&self) -> &[Resource] {
        self.children
            .as_ref()
            .map(|c| c.resource.as_slice())
            .unwrap_or(&[])
    }

    /// Collects this resource and its descendants that carry graph attributes, depth first
    pub fn flatten_with_attributes(&self) -> Vec<Resource> {
        let mut found = Vec::new();
        self.collect_with_attributes(&mut found);
        found
    }

    fn collect_with_attributes(&self, found: &mut Vec<Resource>) {
        if !self.rrd_graph_attributes.is_empty() {
            found.push(self.clone());
        }
        for child in self.children() {
            child.collect_with_attributes(found);
        }
    }
}

/// Entry offered to the dashboard for populating a template variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFindValue {
    pub text: String,
    pub expandable: bool,
}

impl MetricFindValue {
    pub fn expandable(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expandable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceStatus {
    pub status: String,
    pub message: String,
    pub title: String,
}

impl DatasourceStatus {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: "Data source is working".to_string(),
            title: "Success".to_string(),
        }
    }
}
