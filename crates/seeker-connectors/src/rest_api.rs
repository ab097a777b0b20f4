//! Simulated REST API connector
//!
//! The query string is a JSON request description:
//!
//! ```json
//! {"url": "https://api.example.com/v1/events", "method": "GET",
//!  "headers": {}, "data": {}, "params": {}}
//! ```
//!
//! Every field is optional. The time range is added to `params` as
//! `start_time` / `end_time`. There is no session; each call stands alone.

use crate::connector::{Connector, ConnectorError};
use crate::fixture;
use seeker_core::{Record, RestApiSettings, TimeRange};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Parsed request description
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RestRequest {
    /// Target URL
    #[serde(default)]
    pub url: String,
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,
    /// Request headers, layered over the configured defaults
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body for POST and PUT
    #[serde(default)]
    pub data: Value,
    /// Query parameters
    #[serde(default)]
    pub params: Map<String, Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RestRequest {
    /// Parse a query string
    ///
    /// # Errors
    /// `ConnectorError::Query` if the string is not a JSON object.
    pub fn parse(query_string: &str) -> Result<Self, ConnectorError> {
        serde_json::from_str(query_string)
            .map_err(|e| ConnectorError::Query(format!("query string must be a JSON object: {e}")))
    }
}

/// Generic REST connector
#[derive(Debug, Default)]
pub struct RestApiConnector {
    settings: RestApiSettings,
    latency: Duration,
}

impl RestApiConnector {
    /// Create connector
    #[must_use]
    pub fn new(settings: RestApiSettings) -> Self {
        Self {
            settings,
            latency: Duration::ZERO,
        }
    }

    /// With simulated request latency
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Build the request that would be sent: defaults merged, time range attached
    ///
    /// # Errors
    /// `ConnectorError::Query` if the query string is not a JSON request.
    pub fn prepare(&self, query_string: &str, time_range: &TimeRange) -> Result<RestRequest, ConnectorError> {
        let mut request = RestRequest::parse(query_string)?;
        for (name, value) in &self.settings.default_headers {
            request
                .headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        request
            .params
            .insert("start_time".into(), json!(time_range.start));
        request.params.insert("end_time".into(), json!(time_range.end));
        request.method = request.method.to_ascii_uppercase();
        Ok(request)
    }
}

#[async_trait::async_trait]
impl Connector for RestApiConnector {
    async fn execute_query(
        &self,
        query_string: &str,
        time_range: &TimeRange,
        max_results: usize,
    ) -> Result<Vec<Record>, ConnectorError> {
        let request = self.prepare(query_string, time_range)?;
        let params = Value::Object(request.params.clone());
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            params = %params,
            "Sending REST request"
        );
        if matches!(request.method.as_str(), "POST" | "PUT") {
            tracing::trace!(body = %request.data, "Request body");
        }
        fixture::pause(self.latency).await;

        let mut records = responses(&request.url, max_results);
        records.truncate(max_results);
        Ok(records)
    }
}

fn responses(url: &str, max_results: usize) -> Vec<Record> {
    let lower = url.to_lowercase();
    if lower.contains("virustotal") {
        virustotal_report(&lower)
    } else if lower.contains("mitre") || lower.contains("attack") {
        if lower.contains("techniques") {
            attack_techniques()
        } else if lower.contains("groups") {
            attack_groups()
        } else {
            Vec::new()
        }
    } else if lower.contains("crowdstrike") {
        crowdstrike_events()
    } else {
        (1..=max_results.min(fixture::GENERIC_CAP))
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let score = (100 - i) as f64 / 100.0;
                json!({
                    "id": i.to_string(),
                    "timestamp": format!("2023-06-15T{i:02}:00:00Z"),
                    "value": format!("Result {i} for {url}"),
                    "score": score,
                })
            })
            .collect()
    }
}

fn virustotal_report(url: &str) -> Vec<Record> {
    let (kind, id) = if url.contains("file") {
        ("file", "44d88612fea8a8f36de82e1278abb02f")
    } else {
        ("domain", "example.com")
    };
    vec![json!({
        "data": {
            "attributes": {
                "last_analysis_stats": {"malicious": 15, "suspicious": 5, "undetected": 54, "harmless": 26},
                "last_analysis_date": 1_623_758_400,
                "reputation": -25,
                "total_votes": {"malicious": 12, "harmless": 3},
            },
            "type": kind,
            "id": id,
        }
    })]
}

fn attack_techniques() -> Vec<Record> {
    vec![
        json!({
            "id": "T1546.003",
            "name": "Windows Management Instrumentation Event Subscription",
            "description": "Adversaries may establish persistence by executing malicious content triggered by a Windows Management Instrumentation (WMI) event subscription.",
            "tactic": "persistence",
            "platforms": ["Windows"],
            "data_sources": ["WMI Objects: WMI Event Subscription", "Process: Process Creation", "Windows Registry: Windows Registry Key Creation"],
        }),
        json!({
            "id": "T1047",
            "name": "Windows Management Instrumentation",
            "description": "Adversaries may abuse Windows Management Instrumentation (WMI) to execute malicious commands and payloads.",
            "tactic": "execution",
            "platforms": ["Windows"],
            "data_sources": ["Process: Process Creation", "Module: Module Load", "Script: Script Execution"],
        }),
    ]
}

fn attack_groups() -> Vec<Record> {
    vec![
        json!({
            "id": "G0016",
            "name": "APT29",
            "description": "APT29 is a threat group that has been attributed to the Russian government and has operated since at least 2008.",
            "aliases": ["Cozy Bear", "The Dukes"],
            "techniques": ["T1047", "T1546.003", "T1078", "T1098"],
        }),
        json!({
            "id": "G0035",
            "name": "APT32",
            "description": "APT32 is a threat group that has been active since at least 2014 and has targeted multiple private sector industries as well as foreign governments.",
            "aliases": ["OceanLotus", "SeaLotus"],
            "techniques": ["T1047", "T1059.001", "T1204.002"],
        }),
    ]
}

fn crowdstrike_events() -> Vec<Record> {
    vec![
        json!({
            "id": "event-001",
            "device_id": "123456789",
            "timestamp": "2023-06-15T14:22:33Z",
            "event_type": "ProcessRollup2",
            "process_id": "12345",
            "parent_process_id": "54321",
            "process_name": "wmiprvse.exe",
            "process_path": r"C:\Windows\System32\wbem\WmiPrvSE.exe",
            "user": "SYSTEM",
        }),
        json!({
            "id": "event-002",
            "device_id": "123456789",
            "timestamp": "2023-06-15T14:23:45Z",
            "event_type": "ProcessRollup2",
            "process_id": "23456",
            "parent_process_id": "12345",
            "process_name": "powershell.exe",
            "process_path": r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe",
            "command_line": r#"powershell.exe -Command "Get-WmiObject Win32_Process""#,
            "user": r"DOMAIN\admin",
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn run(query: &str, max_results: usize) -> Result<Vec<Record>, ConnectorError> {
        RestApiConnector::default()
            .execute_query(query, &TimeRange::default(), max_results)
            .await
    }

    #[test]
    fn prepare_merges_defaults_and_time_range() {
        let mut defaults = BTreeMap::new();
        defaults.insert("Accept".to_string(), "application/json".to_string());
        defaults.insert("X-Api-Key".to_string(), "default".to_string());
        let connector = RestApiConnector::new(RestApiSettings {
            default_headers: defaults,
        });

        let request = connector
            .prepare(
                r#"{"url": "https://intel.local/iocs", "method": "post", "headers": {"X-Api-Key": "override"}}"#,
                &TimeRange::new("2024-01-01T00:00:00Z", "now"),
            )
            .unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.headers["X-Api-Key"], "override");
        assert_eq!(request.headers["Accept"], "application/json");
        assert_eq!(request.params["start_time"], "2024-01-01T00:00:00Z");
        assert_eq!(request.params["end_time"], "now");
    }

    #[tokio::test]
    async fn attack_catalog_lookups() {
        let techniques = run(r#"{"url": "https://attack.mitre.org/api/techniques"}"#, 1000)
            .await
            .unwrap();
        assert_eq!(techniques.len(), 2);
        assert_eq!(techniques[1]["id"], "T1047");

        let groups = run(r#"{"url": "https://attack.mitre.org/api/groups"}"#, 1)
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["name"], "APT29");
    }

    #[tokio::test]
    async fn virustotal_distinguishes_files() {
        let file = run(r#"{"url": "https://www.virustotal.com/api/v3/files/abc"}"#, 10)
            .await
            .unwrap();
        assert_eq!(file[0]["data"]["type"], "file");
        let domain = run(r#"{"url": "https://www.virustotal.com/api/v3/domains/x"}"#, 10)
            .await
            .unwrap();
        assert_eq!(domain[0]["data"]["id"], "example.com");
    }

    #[tokio::test]
    async fn generic_endpoint_is_capped_at_ten() {
        let records = run(r#"{"url": "https://api.example.com/events"}"#, 1000)
            .await
            .unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[0]["id"], "1");
        assert_eq!(records[0]["value"], "Result 1 for https://api.example.com/events");
    }

    #[tokio::test]
    async fn non_json_query_is_query_error() {
        let err = run("index=main", 10).await.unwrap_err();
        assert!(matches!(err, ConnectorError::Query(_)));
        let empty = run("", 10).await.unwrap_err();
        assert!(matches!(empty, ConnectorError::Query(_)));
    }
}
