//! Simulated Elasticsearch connector

use crate::connector::{Connector, ConnectorError};
use crate::fixture;
use crate::session::{LazySession, Session};
use seeker_core::{ElasticSettings, Record, TimeRange};
use serde_json::json;
use std::time::Duration;

/// Elasticsearch connector
#[derive(Debug)]
pub struct ElasticConnector {
    settings: ElasticSettings,
    latency: Duration,
    session: LazySession,
}

impl ElasticConnector {
    /// Create connector; the cluster is contacted on first query
    #[must_use]
    pub fn new(settings: ElasticSettings) -> Self {
        Self {
            settings,
            latency: Duration::ZERO,
            session: LazySession::new(),
        }
    }

    /// With simulated network latency
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
        if self.settings.hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(ConnectorError::Connection("no elasticsearch hosts configured".into()));
        }
        let endpoint = self.settings.hosts.join(", ");
        tracing::info!(hosts = %endpoint, "Connecting to Elasticsearch");
        fixture::pause(self.latency).await;
        Ok(Session { endpoint })
    }
}

#[async_trait::async_trait]
impl Connector for ElasticConnector {
    async fn execute_query(
        &self,
        query_string: &str,
        time_range: &TimeRange,
        max_results: usize,
    ) -> Result<Vec<Record>, ConnectorError> {
        if query_string.trim().is_empty() {
            return Err(ConnectorError::Query("empty query".into()));
        }
        let session = self.session.get_or_connect(|| self.connect()).await?;
        tracing::debug!(
            hosts = %session.endpoint,
            query = query_string,
            %time_range,
            max_results,
            "Executing Elasticsearch query"
        );
        fixture::pause(self.latency).await;
        Ok(search_hits(query_string, max_results))
    }
}

fn search_hits(query_string: &str, max_results: usize) -> Vec<Record> {
    let lower = query_string.to_lowercase();
    if lower.contains("winlogbeat") && lower.contains("4688") {
        fixture::repeat(&process_creation_hits(), max_results, stamp)
    } else if lower.contains("filebeat") && lower.contains("dns") {
        fixture::repeat(&dns_hits(), max_results, stamp)
    } else {
        (0..max_results.min(fixture::GENERIC_CAP))
            .map(|i| {
                json!({
                    "_index": "generic-index",
                    "_id": format!("doc_{i}"),
                    "_source": {
                        "@timestamp": format!("2023-06-15T{i:02}:00:00.000Z"),
                        "message": format!("Event {i} matching query: {query_string}"),
                        "host": {"name": format!("host_{}", i % 5)},
                        "event": {"dataset": "generic", "module": "system"},
                    },
                })
            })
            .collect()
    }
}

/// Unique `_id` and spread `@timestamp` per copy
fn stamp(hit: &mut Record, index: usize) {
    let id = hit["_id"].as_str().unwrap_or("hit").to_string();
    hit["_id"] = json!(format!("{id}_{index}"));
    hit["_source"]["@timestamp"] = json!(format!("2023-06-15T{}.000Z", fixture::clock(index)));
}

fn process_creation_hits() -> Vec<Record> {
    let hit = |id: &str, host: &str, new_process: &str, parent: &str, user: &str| {
        json!({
            "_index": "winlogbeat-*",
            "_id": id,
            "_source": {
                "host": {"name": host},
                "event": {"code": 4688, "provider": "Microsoft-Windows-Security-Auditing"},
                "winlog": {
                    "event_id": 4688,
                    "computer_name": format!("{host}.domain.local"),
                    "event_data": {
                        "NewProcessName": new_process,
                        "ParentProcessName": parent,
                        "SubjectUserName": user,
                    },
                },
            },
        })
    };
    vec![
        hit("abc123", "SERVER01", r"C:\Windows\System32\wbem\WmiPrvSE.exe", r"C:\Windows\System32\services.exe", "SYSTEM"),
        hit("def456", "WORKSTATION02", r"C:\Windows\System32\cmd.exe", r"C:\Windows\explorer.exe", r"DOMAIN\user1"),
        hit("ghi789", "SERVER03", r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe", r"C:\Windows\System32\cmd.exe", r"DOMAIN\admin"),
    ]
}

fn dns_hits() -> Vec<Record> {
    let hit = |id: &str, name: &str, answer: &str, src_ip: &str, src_port: u16| {
        json!({
            "_index": "filebeat-*",
            "_id": id,
            "_source": {
                "dns": {
                    "question": {"name": name},
                    "answers": [{"data": answer, "type": "A"}],
                },
                "source": {"ip": src_ip, "port": src_port},
                "destination": {"ip": "8.8.8.8", "port": 53},
            },
        })
    };
    vec![
        hit("dns1", "legitimate-domain.com", "192.168.1.100", "10.0.0.5", 53252),
        hit("dns2", "suspicious-domain.ru", "203.0.113.100", "10.0.0.7", 49123),
        hit("dns3", "malicious-c2-server.cn", "198.51.100.55", "10.0.0.9", 51234),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn connector() -> ElasticConnector {
        ElasticConnector::new(ElasticSettings::default())
    }

    #[tokio::test]
    async fn process_creation_hits_get_unique_ids() {
        let hits = connector()
            .execute_query("index:winlogbeat-* AND event.code:4688", &TimeRange::default(), 1000)
            .await
            .unwrap();
        assert_eq!(hits.len(), 100);
        let ids: HashSet<_> = hits.iter().map(|h| h["_id"].as_str().unwrap().to_string()).collect();
        assert_eq!(ids.len(), 100);
        assert_eq!(hits[0]["_source"]["winlog"]["event_id"], 4688);
    }

    #[tokio::test]
    async fn dns_needs_both_markers() {
        let dns = connector()
            .execute_query("filebeat dns.question.name:*.ru", &TimeRange::default(), 5)
            .await
            .unwrap();
        assert_eq!(dns.len(), 5);
        assert_eq!(dns[1]["_source"]["dns"]["question"]["name"], "suspicious-domain.ru");

        let generic = connector()
            .execute_query("filebeat process", &TimeRange::default(), 1000)
            .await
            .unwrap();
        assert_eq!(generic.len(), 10);
        assert_eq!(generic[0]["_index"], "generic-index");
    }

    #[tokio::test]
    async fn no_hosts_is_connection_error() {
        let elastic = ElasticConnector::new(ElasticSettings {
            hosts: Vec::new(),
            ..ElasticSettings::default()
        });
        let err = elastic
            .execute_query("*", &TimeRange::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Connection(_)));
        assert_eq!(elastic.connect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_first_queries_share_one_connect() {
        let elastic = std::sync::Arc::new(connector().with_latency(Duration::from_millis(500)));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let elastic = elastic.clone();
            handles.push(tokio::spawn(async move {
                elastic.execute_query("*", &TimeRange::default(), 1).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(elastic.connect_attempts(), 1);
    }
}
