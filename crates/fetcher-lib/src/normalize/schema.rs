//! Per-kind dataset layouts
//!
//! Every resource kind shares one extraction engine; what differs is
//! captured declaratively by a [`KindDescriptor`].

use crate::models::AggregateKind;

/// Dataset name of the rollout rows derived from the controller pipeline
pub const ROLLOUT_DATASET: &str = "Rollout";

/// Where a kind's identity column comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// `properties.cluster`, with the upstream sample placeholder rewritten
    ClusterProperty,
    /// A required string under `properties`
    Property(&'static str),
    /// The `kubernetes_io_metadata_name` label, empty when absent
    NamespaceLabel,
    /// The item's own name
    ItemName,
}

/// Declarative description of one resource kind's dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindDescriptor {
    pub kind: AggregateKind,
    pub identity: IdentitySource,
    /// Emit `ClusterName` and `Region` columns
    pub cluster_columns: bool,
    /// Emit a `Namespace` column
    pub namespace_column: bool,
    /// Emit a `Shared Cost` column (and require `sharedCost` on items)
    pub shared_cost: bool,
    /// Derive rows for the rollout dataset
    pub rollout: bool,
    /// Write a local debugging copy alongside the durable dataset
    pub local_copy: bool,
}

impl KindDescriptor {
    /// Default layout for a kind
    pub fn for_kind(kind: AggregateKind) -> Self {
        let base = Self {
            kind,
            identity: IdentitySource::ItemName,
            cluster_columns: true,
            namespace_column: false,
            shared_cost: true,
            rollout: false,
            local_copy: false,
        };

        match kind {
            AggregateKind::Cluster => Self {
                identity: IdentitySource::ClusterProperty,
                cluster_columns: false,
                ..base
            },
            AggregateKind::Node => Self {
                identity: IdentitySource::Property("node"),
                ..base
            },
            AggregateKind::Pod => Self {
                identity: IdentitySource::Property("pod"),
                namespace_column: true,
                ..base
            },
            AggregateKind::Namespace => Self {
                identity: IdentitySource::NamespaceLabel,
                ..base
            },
            AggregateKind::Deployment => Self {
                namespace_column: true,
                shared_cost: false,
                local_copy: true,
                ..base
            },
            AggregateKind::Controller => Self {
                namespace_column: true,
                shared_cost: false,
                rollout: true,
                local_copy: true,
                ..base
            },
            AggregateKind::ControllerKind => base,
            AggregateKind::Service => Self {
                namespace_column: true,
                ..base
            },
        }
    }

    /// Override whether the `Shared Cost` column is carried
    pub fn with_shared_cost(mut self, shared_cost: bool) -> Self {
        self.shared_cost = shared_cost;
        self
    }

    pub fn dataset_name(&self) -> &'static str {
        self.kind.display_name()
    }

    /// Object key of the kind's dataset, e.g. `Pod/Pod.csv`
    pub fn dataset_key(&self) -> String {
        dataset_key(self.dataset_name())
    }

    /// Object key of the derived rollout dataset
    pub fn rollout_key(&self) -> String {
        dataset_key(ROLLOUT_DATASET)
    }

    pub fn header(&self) -> Vec<String> {
        self.columns(self.dataset_name())
    }

    pub fn rollout_header(&self) -> Vec<String> {
        self.columns(ROLLOUT_DATASET)
    }

    /// Number of fields in every row of this layout
    pub fn width(&self) -> usize {
        // identity, window start/end, seven costs, three efficiencies
        let mut width = 1 + 2 + 7 + 3;
        if self.cluster_columns {
            width += 2;
        }
        if self.namespace_column {
            width += 1;
        }
        if self.shared_cost {
            width += 1;
        }
        width
    }

    fn columns(&self, identity: &str) -> Vec<String> {
        let mut columns = vec![identity];

        if self.cluster_columns {
            columns.extend(["ClusterName", "Region"]);
        }
        if self.namespace_column {
            columns.push("Namespace");
        }

        columns.extend([
            "Window Start",
            "Window End",
            "Cpu Cost",
            "Gpu Cost",
            "Ram Cost",
            "PV Cost",
            "Network Cost",
            "LoadBalancer Cost",
        ]);
        if self.shared_cost {
            columns.push("Shared Cost");
        }
        columns.extend([
            "Total Cost",
            "Cpu Efficiency",
            "Ram Efficiency",
            "Total Efficiency",
        ]);

        columns.into_iter().map(String::from).collect()
    }
}

/// Object key for a named dataset
pub fn dataset_key(name: &str) -> String {
    format!("{0}/{0}.csv", name)
}
