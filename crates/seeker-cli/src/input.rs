//! Plan and override inputs read from disk or the command line

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use seeker_core::{Plan, PlanCritique, Query};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

/// Plan file as written by hand or exported from the planner
///
/// Identity and timestamps are optional; missing ones are generated.
#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    plan_id: Option<Uuid>,
    hypothesis: String,
    #[serde(default = "default_analyst")]
    analyst_id: String,
    queries: Vec<Query>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    critique: Option<PlanCritique>,
}

fn default_analyst() -> String {
    "cli".to_string()
}

pub(crate) fn parse_plan(text: &str) -> anyhow::Result<Plan> {
    let file: PlanFile = serde_json::from_str(text).context("plan is not valid JSON")?;
    let mut plan = Plan::new(file.hypothesis, file.analyst_id, file.queries)?;
    if let Some(id) = file.plan_id {
        plan.plan_id = id;
    }
    if let Some(created_at) = file.created_at {
        plan.created_at = created_at;
    }
    plan.critique = file.critique;
    Ok(plan)
}

pub(crate) fn read_plan(path: &Path) -> anyhow::Result<Plan> {
    let text = read(path)?;
    parse_plan(&text).with_context(|| format!("loading plan {}", path.display()))
}

pub(crate) fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// `query_id=replacement query`
pub(crate) fn parse_modification(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((id, query)) = raw.split_once('=') else {
        bail!("expected QUERY_ID=QUERY, got {raw:?}");
    };
    let id = id.trim();
    if id.is_empty() {
        bail!("missing query id in {raw:?}");
    }
    Ok((id.to_string(), query.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn minimal_plan_file() {
        let plan = parse_plan(
            r#"{
                "hypothesis": "WMI persistence",
                "queries": [
                    {"query_id": "q1", "data_source": "splunk", "query_string": "index=wmi"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(plan.analyst_id, "cli");
        assert_eq!(plan.queries[0].backend_kind, "splunk");
        assert_eq!(plan.queries[0].time_range.start, "-24h");
    }

    #[test]
    fn plan_id_is_kept() {
        let id = Uuid::new_v4();
        let plan = parse_plan(&format!(
            r#"{{"plan_id": "{id}", "hypothesis": "h", "queries": []}}"#
        ))
        .unwrap();
        assert_eq!(plan.plan_id, id);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse_plan(
            r#"{"hypothesis": "h", "queries": [
                {"query_id": "q1", "backend_kind": "splunk", "query_string": "a"},
                {"query_id": "q1", "backend_kind": "splunk", "query_string": "b"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate query id"));
    }

    #[test]
    fn read_plan_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"hypothesis": "h", "queries": []}}"#).unwrap();
        assert!(read_plan(file.path()).unwrap().queries.is_empty());
        assert!(read_plan(Path::new("/nonexistent/plan.json")).is_err());
    }

    #[test]
    fn modifications() {
        assert_eq!(
            parse_modification("q1=index=main user=admin").unwrap(),
            ("q1".to_string(), "index=main user=admin".to_string())
        );
        assert!(parse_modification("no-equals").is_err());
        assert!(parse_modification("=query").is_err());
    }
}
