//! Resource addressing for the measurements API
//!
//! Nodes are addressed either by database id (`node[42]`) or by their
//! foreign source and foreign id (`nodeSource[FS:FID]`).

const NODE_PREFIX: &str = "node[";
const NODE_SOURCE_PREFIX: &str = "nodeSource[";

/// Returns true when the identifier is a `foreignSource:foreignId` pair
pub fn is_foreign_source(node_id: &str) -> bool {
    node_id.find(':').map_or(false, |idx| idx > 0)
}

/// Returns the resource id of the node itself
pub fn node_resource(node_id: &str) -> String {
    if is_foreign_source(node_id) {
        format!("{}{}]", NODE_SOURCE_PREFIX, node_id)
    } else {
        format!("{}{}]", NODE_PREFIX, node_id)
    }
}

/// Resolves a node identifier and a node-relative resource path into a full resource id
pub fn resolve(node_id: &str, resource_path: &str) -> String {
    format!("{}.{}", node_resource(node_id), resource_path)
}

/// Rewrites a `node[fs:fid]` prefix into `nodeSource[fs:fid]`.
///
/// Substituting a foreign-source pair into a `node[...]` prefix produces an id the
/// server cannot resolve; any other input is returned unchanged.
pub fn repair_node_prefix(resource_id: &str) -> String {
    if let Some(rest) = resource_id.strip_prefix(NODE_PREFIX) {
        let bracketed = rest.split(']').next().unwrap_or_default();
        if rest.contains(']') && bracketed.contains(':') {
            return format!("{}{}", NODE_SOURCE_PREFIX, rest);
        }
    }
    resource_id.to_string()
}

/// Strips the leading `node[..].` or `nodeSource[..].` from a resource id
pub fn strip_node_prefix(resource_id: &str) -> Option<&str> {
    let rest = resource_id
        .strip_prefix(NODE_SOURCE_PREFIX)
        .or_else(|| resource_id.strip_prefix(NODE_PREFIX))?;
    let (_, path) = rest.split_once("].")?;
    Some(path)
}
