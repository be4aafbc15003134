//! Core data models for the efficiency fetcher

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dimension along which the allocation API groups costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateKind {
    Cluster,
    Node,
    Pod,
    Namespace,
    Deployment,
    Controller,
    ControllerKind,
    Service,
}

impl AggregateKind {
    /// Every kind, in the order pipelines are launched
    pub const ALL: [AggregateKind; 8] = [
        AggregateKind::Cluster,
        AggregateKind::Node,
        AggregateKind::Pod,
        AggregateKind::Namespace,
        AggregateKind::Service,
        AggregateKind::Deployment,
        AggregateKind::Controller,
        AggregateKind::ControllerKind,
    ];

    /// Value of the `aggregate` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            AggregateKind::Cluster => "cluster",
            AggregateKind::Node => "node",
            AggregateKind::Pod => "pod",
            AggregateKind::Namespace => "namespace",
            AggregateKind::Deployment => "deployment",
            AggregateKind::Controller => "controller",
            AggregateKind::ControllerKind => "controllerKind",
            AggregateKind::Service => "service",
        }
    }

    /// Capitalized name used for dataset keys and identity columns
    pub fn display_name(&self) -> &'static str {
        match self {
            AggregateKind::Cluster => "Cluster",
            AggregateKind::Node => "Node",
            AggregateKind::Pod => "Pod",
            AggregateKind::Namespace => "Namespace",
            AggregateKind::Deployment => "Deployment",
            AggregateKind::Controller => "Controller",
            AggregateKind::ControllerKind => "ControllerKind",
            AggregateKind::Service => "Service",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for AggregateKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregateKind::ALL
            .into_iter()
            .find(|kind| kind.as_param().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown aggregate kind: {}", s))
    }
}

/// Reporting window passed to the allocation API as `start,end`
///
/// Both bounds are opaque ISO-8601 instants; nothing downstream parses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: String,
    pub end: String,
}

impl ReportWindow {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Yesterday 00:00Z to today 00:00Z, relative to `now`
    pub fn previous_day(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let yesterday = today - Duration::days(1);

        Self {
            start: format!("{}T00:00:00Z", yesterday.format("%Y-%m-%d")),
            end: format!("{}T00:00:00Z", today.format("%Y-%m-%d")),
        }
    }
}

impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.start, self.end)
    }
}

impl FromStr for ReportWindow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("window must be formatted as <start>,<end>: {}", s))?;

        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            anyhow::bail!("window bounds must not be empty: {}", s);
        }

        Ok(Self::new(start, end))
    }
}

/// One persisted CSV record, ordered to match its dataset header
pub type Row = Vec<String>;

/// Rows normalized from one allocation response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRows {
    /// Rows for the kind's own dataset
    pub primary: Vec<Row>,
    /// Rows for the derived rollout dataset (controller kind only)
    pub rollout: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_params() {
        assert_eq!(AggregateKind::ControllerKind.as_param(), "controllerKind");
        assert_eq!(AggregateKind::ControllerKind.display_name(), "ControllerKind");
        assert_eq!(AggregateKind::Pod.to_string(), "pod");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "controllerKind".parse::<AggregateKind>().unwrap(),
            AggregateKind::ControllerKind
        );
        assert_eq!(" Node ".parse::<AggregateKind>().unwrap(), AggregateKind::Node);
        assert!("replicaset".parse::<AggregateKind>().is_err());
    }

    #[test]
    fn test_kind_deserializes_camel_case() {
        let kind: AggregateKind = serde_json::from_str("\"controllerKind\"").unwrap();
        assert_eq!(kind, AggregateKind::ControllerKind);
    }

    #[test]
    fn test_previous_day_window() {
        let now = Utc.with_ymd_and_hms(2024, 7, 28, 15, 42, 7).unwrap();
        let window = ReportWindow::previous_day(now);

        assert_eq!(window.start, "2024-07-27T00:00:00Z");
        assert_eq!(window.end, "2024-07-28T00:00:00Z");
        assert_eq!(
            window.to_string(),
            "2024-07-27T00:00:00Z,2024-07-28T00:00:00Z"
        );
    }

    #[test]
    fn test_previous_day_crosses_month_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let window = ReportWindow::previous_day(now);

        assert_eq!(window.start, "2024-02-29T00:00:00Z");
        assert_eq!(window.end, "2024-03-01T00:00:00Z");
    }

    #[test]
    fn test_window_from_str() {
        let window: ReportWindow = "2024-07-27T00:00:00Z, 2024-07-28T00:00:00Z".parse().unwrap();
        assert_eq!(window.start, "2024-07-27T00:00:00Z");
        assert_eq!(window.end, "2024-07-28T00:00:00Z");

        assert!("2024-07-27T00:00:00Z".parse::<ReportWindow>().is_err());
        assert!(",2024-07-28T00:00:00Z".parse::<ReportWindow>().is_err());
    }
}
