//! Simulated Splunk connector
//!
//! Speaks the connector contract with canned search results keyed on the
//! query text: WMI activity, lateral movement authentications, or generic
//! events echoing the search.

use crate::connector::{Connector, ConnectorError};
use crate::fixture;
use crate::session::{LazySession, Session};
use seeker_core::{Record, SplunkSettings, TimeRange};
use serde_json::json;
use std::time::Duration;

/// Splunk search connector
#[derive(Debug)]
pub struct SplunkConnector {
    settings: SplunkSettings,
    latency: Duration,
    session: LazySession,
}

impl SplunkConnector {
    /// Create connector; nothing is contacted until the first query
    #[must_use]
    pub fn new(settings: SplunkSettings) -> Self {
        Self {
            settings,
            latency: Duration::ZERO,
            session: LazySession::new(),
        }
    }

    /// With simulated network latency per connect and per search
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Connect attempts made so far
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.session.connect_attempts()
    }

    async fn connect(&self) -> Result<Session, ConnectorError> {
        let host = self.settings.host.trim();
        if host.is_empty() {
            return Err(ConnectorError::Connection("splunk host is not configured".into()));
        }
        let endpoint = format!("{host}:{}", self.settings.port);
        tracing::info!(%endpoint, username = %self.settings.username, "Connecting to Splunk");
        fixture::pause(self.latency).await;
        Ok(Session { endpoint })
    }
}

#[async_trait::async_trait]
impl Connector for SplunkConnector {
    async fn execute_query(
        &self,
        query_string: &str,
        time_range: &TimeRange,
        max_results: usize,
    ) -> Result<Vec<Record>, ConnectorError> {
        if query_string.trim().is_empty() {
            return Err(ConnectorError::Query("empty search string".into()));
        }
        let session = self.session.get_or_connect(|| self.connect()).await?;
        tracing::debug!(
            endpoint = %session.endpoint,
            search = query_string,
            %time_range,
            max_results,
            "Executing Splunk search"
        );
        fixture::pause(self.latency).await;
        Ok(search_results(query_string, max_results))
    }
}

fn search_results(query_string: &str, max_results: usize) -> Vec<Record> {
    let lower = query_string.to_lowercase();
    if lower.contains("wmi") {
        fixture::repeat(&wmi_events(), max_results, stamp)
    } else if lower.contains("lateral movement") {
        fixture::repeat(&lateral_movement_events(), max_results, stamp)
    } else {
        (0..max_results.min(fixture::GENERIC_CAP))
            .map(|i| {
                json!({
                    "index": format!("index_{i}"),
                    "source": format!("source_{i}"),
                    "sourcetype": format!("sourcetype_{i}"),
                    "event": format!("Event {i} matching query: {query_string}"),
                    "timestamp": format!("2023-06-15T{i:02}:00:00Z"),
                })
            })
            .collect()
    }
}

fn stamp(record: &mut Record, index: usize) {
    record["timestamp"] = json!(format!("2023-06-15T{}Z", fixture::clock(index)));
}

fn wmi_events() -> Vec<Record> {
    vec![
        json!({"host": "SERVER01", "process": "WmiPrvSE.exe", "command_line": r"C:\Windows\System32\wbem\WmiPrvSE.exe", "user": "SYSTEM"}),
        json!({"host": "SERVER02", "process": "WmiPrvSE.exe", "command_line": r"C:\Windows\System32\wbem\WmiPrvSE.exe -Embedding", "user": "SYSTEM"}),
        json!({"host": "DC01", "process": "powershell.exe", "command_line": r#"powershell.exe -Command "Get-WmiObject Win32_Process""#, "user": r"DOMAIN\admin"}),
        json!({"host": "WORKSTATION03", "process": "wmiprvse.exe", "command_line": r"C:\Windows\System32\wbem\WmiPrvSE.exe", "user": "SYSTEM"}),
        json!({"host": "SERVER01", "process": "cmd.exe", "command_line": r#"cmd.exe /c wmic process call create "calc.exe""#, "user": r"DOMAIN\user"}),
    ]
}

fn lateral_movement_events() -> Vec<Record> {
    vec![
        json!({"src_host": "WORKSTATION01", "dst_host": "SERVER01", "user": r"DOMAIN\admin", "auth_type": "NTLM"}),
        json!({"src_host": "WORKSTATION01", "dst_host": "DC01", "user": r"DOMAIN\admin", "auth_type": "Kerberos"}),
        json!({"src_host": "WORKSTATION02", "dst_host": "SERVER01", "user": r"DOMAIN\user", "auth_type": "NTLM"}),
        json!({"src_host": "SERVER01", "dst_host": "SERVER02", "user": r"DOMAIN\svc_account", "auth_type": "NTLM"}),
        json!({"src_host": "WORKSTATION03", "dst_host": "SERVER03", "user": r"DOMAIN\admin", "auth_type": "Kerberos"}),
    ]
}
