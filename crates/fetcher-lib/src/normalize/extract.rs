//! Row extraction from a single allocation item

use super::schema::{IdentitySource, KindDescriptor};
use crate::allocation::{ItemView, IDLE, UNALLOCATED};
use crate::error::FieldError;
use crate::models::Row;
use serde_json::{Map, Value};

/// Placeholder cluster name present in upstream sample data
pub const PLACEHOLDER_CLUSTER: &str = "cluster-one";

const REGION_LABEL: &str = "topology_kubernetes_io_region";
const NAMESPACE_LABEL: &str = "kubernetes_io_metadata_name";

const LEADING_COSTS: [&str; 6] = [
    "cpuCost",
    "gpuCost",
    "ramCost",
    "pvCost",
    "networkCost",
    "loadBalancerCost",
];
const EFFICIENCIES: [&str; 3] = ["cpuEfficiency", "ramEfficiency", "totalEfficiency"];

/// A row extracted from one item, along with the item's name
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub name: String,
    pub row: Row,
}

/// Extract one row, or `None` for items that are never persisted
pub fn extract_row(
    item_key: &str,
    value: &Value,
    descriptor: &KindDescriptor,
    cluster_name: &str,
) -> Result<Option<ExtractedRow>, FieldError> {
    let item = ItemView::from_value(item_key, value)?;

    let name = item.str_field("name")?;
    if name == UNALLOCATED {
        return Ok(None);
    }
    let idle = name == IDLE;

    let properties = ItemView::new("properties", item.object_field("properties")?);
    let labels = if idle {
        None
    } else {
        properties.opt_object("labels")
    };

    let mut row = Vec::with_capacity(descriptor.width());
    row.push(identity(descriptor.identity, name, idle, &properties, labels, cluster_name)?);

    if descriptor.cluster_columns {
        row.push(cluster_name.to_string());
        row.push(label(labels, REGION_LABEL));
    }
    if descriptor.namespace_column {
        row.push(namespace(&properties, idle));
    }

    let window = ItemView::new("window", item.object_field("window")?);
    row.push(window.str_field("start")?.to_string());
    row.push(window.str_field("end")?.to_string());

    for key in LEADING_COSTS {
        row.push(format_value(item.f64_field(key)?));
    }
    if descriptor.shared_cost {
        row.push(format_value(item.f64_field("sharedCost")?));
    }
    row.push(format_value(item.f64_field("totalCost")?));

    for key in EFFICIENCIES {
        row.push(format_value(item.f64_field(key)? * 100.0));
    }

    Ok(Some(ExtractedRow {
        name: name.to_string(),
        row,
    }))
}

fn identity(
    source: IdentitySource,
    name: &str,
    idle: bool,
    properties: &ItemView<'_>,
    labels: Option<&Map<String, Value>>,
    cluster_name: &str,
) -> Result<String, FieldError> {
    match source {
        IdentitySource::ClusterProperty => {
            let cluster = required_property(properties, "cluster", name, idle)?;
            if cluster == PLACEHOLDER_CLUSTER {
                Ok(cluster_name.to_string())
            } else {
                Ok(cluster.to_string())
            }
        }
        IdentitySource::Property(key) => {
            required_property(properties, key, name, idle).map(str::to_string)
        }
        IdentitySource::NamespaceLabel => Ok(label(labels, NAMESPACE_LABEL)),
        IdentitySource::ItemName => Ok(name.to_string()),
    }
}

/// Idle entries are not attached to a concrete resource, so they fall back
/// to the item name when the property is absent.
fn required_property<'a>(
    properties: &ItemView<'a>,
    key: &str,
    name: &'a str,
    idle: bool,
) -> Result<&'a str, FieldError> {
    match properties.str_field(key) {
        Err(FieldError::Missing(_)) if idle => Ok(name),
        other => other,
    }
}

fn label(labels: Option<&Map<String, Value>>, key: &str) -> String {
    labels
        .and_then(|labels| labels.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn namespace(properties: &ItemView<'_>, idle: bool) -> String {
    if let Some(namespace) = properties.opt_str("namespace") {
        return namespace.to_string();
    }
    if idle {
        return String::new();
    }

    ["namespaceLabels", "labels"]
        .into_iter()
        .filter_map(|key| properties.opt_object(key))
        .find_map(|labels| labels.get(NAMESPACE_LABEL).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Six-decimal rendering used for every numeric column
pub fn format_value(value: f64) -> String {
    format!("{:.6}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AggregateKind;
    use serde_json::json;

    fn item(name: &str, properties: Value) -> Value {
        json!({
            "name": name,
            "properties": properties,
            "window": {"start": "2024-07-27T00:00:00Z", "end": "2024-07-28T00:00:00Z"},
            "cpuCost": 1.0, "gpuCost": 0, "ramCost": 2.0, "pvCost": 0,
            "networkCost": 0, "loadBalancerCost": 0, "sharedCost": 0.25, "totalCost": 3.25,
            "cpuEfficiency": 0.8234, "ramEfficiency": 1.2, "totalEfficiency": 0.0
        })
    }

    fn extract(kind: AggregateKind, value: &Value) -> Result<Option<ExtractedRow>, FieldError> {
        extract_row("key", value, &KindDescriptor::for_kind(kind), "prod-east")
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1.5), "1.500000");
        assert_eq!(format_value(0.0), "0.000000");
        assert_eq!(format_value(0.8234 * 100.0), "82.340000");
    }

    #[test]
    fn test_efficiency_is_scaled_without_clamping() {
        let value = item("web", json!({"node": "ip-10-0-0-1"}));
        let row = extract(AggregateKind::Node, &value).unwrap().unwrap().row;

        let n = row.len();
        assert_eq!(row[n - 3], "82.340000");
        assert_eq!(row[n - 2], "120.000000");
        assert_eq!(row[n - 1], "0.000000");
    }

    #[test]
    fn test_unallocated_is_skipped() {
        let value = item(UNALLOCATED, json!({}));
        assert_eq!(extract(AggregateKind::Deployment, &value).unwrap(), None);
    }

    #[test]
    fn test_cluster_placeholder_is_rewritten() {
        let placeholder = item("cluster-one", json!({"cluster": "cluster-one"}));
        let named = item("staging", json!({"cluster": "staging"}));

        let row = extract(AggregateKind::Cluster, &placeholder).unwrap().unwrap().row;
        assert_eq!(row[0], "prod-east");
        assert_eq!(row[1], "2024-07-27T00:00:00Z");

        let row = extract(AggregateKind::Cluster, &named).unwrap().unwrap().row;
        assert_eq!(row[0], "staging");
    }

    #[test]
    fn test_region_defaults_to_empty() {
        let value = item("web", json!({"node": "n1", "labels": {"team": "core"}}));
        let row = extract(AggregateKind::Node, &value).unwrap().unwrap().row;
        assert_eq!(row[..3], ["n1", "prod-east", ""]);

        let value = item("web", json!({"node": "n1"}));
        let row = extract(AggregateKind::Node, &value).unwrap().unwrap().row;
        assert_eq!(row[2], "");
    }

    #[test]
    fn test_namespace_preference_order() {
        let explicit = item(
            "web",
            json!({
                "namespace": "payments",
                "namespaceLabels": {"kubernetes_io_metadata_name": "ignored"}
            }),
        );
        let from_namespace_labels = item(
            "web",
            json!({"namespaceLabels": {"kubernetes_io_metadata_name": "billing"}}),
        );
        let from_labels = item(
            "web",
            json!({"labels": {"kubernetes_io_metadata_name": "search"}}),
        );
        let none = item("web", json!({}));

        let ns = |value: &Value| extract(AggregateKind::Deployment, value).unwrap().unwrap().row[3].clone();
        assert_eq!(ns(&explicit), "payments");
        assert_eq!(ns(&from_namespace_labels), "billing");
        assert_eq!(ns(&from_labels), "search");
        assert_eq!(ns(&none), "");
    }

    #[test]
    fn test_idle_skips_label_lookups() {
        let value = item(
            IDLE,
            json!({
                "cluster": "c",
                "labels": {
                    "topology_kubernetes_io_region": "us-east-1",
                    "kubernetes_io_metadata_name": "kube-system"
                }
            }),
        );

        let row = extract(AggregateKind::Pod, &value).unwrap().unwrap().row;
        assert_eq!(row[..4], [IDLE, "prod-east", "", ""]);

        let row = extract(AggregateKind::Namespace, &value).unwrap().unwrap().row;
        assert_eq!(row[0], "");
        assert_eq!(row[2], "");
    }

    #[test]
    fn test_missing_identity_property_is_fatal() {
        let value = item("web-0", json!({"cluster": "c"}));
        assert_eq!(
            extract(AggregateKind::Pod, &value).unwrap_err(),
            FieldError::Missing("properties.pod".to_string())
        );
    }

    #[test]
    fn test_mistyped_cost_is_fatal() {
        let mut value = item("web", json!({}));
        value["totalCost"] = json!("3.25");
        assert_eq!(
            extract(AggregateKind::Deployment, &value).unwrap_err(),
            FieldError::WrongType {
                field: "key.totalCost".to_string(),
                expected: "a number"
            }
        );
    }

    #[test]
    fn test_shared_cost_only_required_when_carried() {
        let mut value = item("web", json!({}));
        value.as_object_mut().unwrap().remove("sharedCost");

        let row = extract(AggregateKind::Deployment, &value).unwrap().unwrap().row;
        assert_eq!(row.len(), KindDescriptor::for_kind(AggregateKind::Deployment).width());

        assert_eq!(
            extract(AggregateKind::ControllerKind, &value).unwrap_err(),
            FieldError::Missing("key.sharedCost".to_string())
        );
    }

    #[test]
    fn test_missing_window_is_fatal() {
        let mut value = item("web", json!({}));
        value["window"] = json!({"start": "2024-07-27T00:00:00Z"});
        assert_eq!(
            extract(AggregateKind::Service, &value).unwrap_err(),
            FieldError::Missing("window.end".to_string())
        );
    }
}
