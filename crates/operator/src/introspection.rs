//! Cloud environment detection from cluster node labels.
//!
//! Used when a workload does not specify a location: the first node
//! is taken as representative of the cluster.

use core::error::Error;
use std::collections::BTreeMap;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::Api;
use kube::Client;

const REGION_LABEL: &str = "topology.kubernetes.io/region";
const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

#[derive(Debug, derive_more::Display)]
pub enum IntrospectionError {
    #[display("failed to list cluster nodes")]
    ListFailed,
    #[display("no nodes found in cluster")]
    NoNodes,
}

impl Error for IntrospectionError {}

/// Provider, region and zone of the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudEnvironment {
    /// `gcp`, `aws`, `azure` or `unknown`
    pub provider: String,
    pub region: String,
    pub zone: String,
}

/// Inspect node labels to infer the cloud provider and region.
pub async fn detect_cloud_environment(
    client: Client,
) -> Result<CloudEnvironment, Report<IntrospectionError>> {
    let nodes: Api<Node> = Api::all(client);
    let node_list = nodes
        .list(&ListParams::default())
        .await
        .change_context(IntrospectionError::ListFailed)?;

    environment_from_nodes(&node_list.items)
}

/// Pure core of the detection, over an already-listed node set.
pub fn environment_from_nodes(
    nodes: &[Node],
) -> Result<CloudEnvironment, Report<IntrospectionError>> {
    let node = nodes
        .first()
        .ok_or_else(|| Report::new(IntrospectionError::NoNodes))?;
    let labels = node.metadata.labels.clone().unwrap_or_default();

    Ok(CloudEnvironment {
        provider: detect_provider(&labels),
        region: labels.get(REGION_LABEL).cloned().unwrap_or_default(),
        zone: labels.get(ZONE_LABEL).cloned().unwrap_or_default(),
    })
}

fn detect_provider(labels: &BTreeMap<String, String>) -> String {
    let provider = if labels.contains_key("cloud.google.com/gke-nodepool") {
        "gcp"
    } else if labels.contains_key("eks.amazonaws.com/nodegroup") {
        "aws"
    } else if labels.contains_key("kubernetes.azure.com/role") {
        "azure"
    } else {
        "unknown"
    };
    provider.to_string()
}
