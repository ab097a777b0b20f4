use proptest::prelude::*;
use seeker_core::critique::DEFAULT_FEEDBACK;
use seeker_core::{CritiqueMerger, CritiqueSummary, Plan, Query, QueryCritique, Severity};
use std::collections::BTreeSet;

fn plan_of(ids: &BTreeSet<String>) -> Plan {
    Plan::new(
        "Credential dumping via LSASS access",
        "analyst-3",
        ids.iter()
            .map(|id| Query::new(id.clone(), "splunk", format!("index=edr {id}")))
            .collect(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn prop_every_query_gets_exactly_one_critique(
        plan_ids in proptest::collection::btree_set("q[0-9]{1,2}", 0..12),
        critiqued in proptest::collection::btree_set("q[0-9]{1,2}", 0..12),
    ) {
        let plan = plan_of(&plan_ids);
        let mut critique = CritiqueSummary::default();
        for id in &critiqued {
            critique.per_query.insert(id.clone(), QueryCritique {
                feedback: format!("tighten {id}"),
                suggested_modifications: String::new(),
                severity: Severity::Medium,
            });
        }

        let merged = CritiqueMerger::new().merge(plan.clone(), critique);
        let per_query = &merged.critique.as_ref().unwrap().per_query;

        prop_assert_eq!(per_query.len(), plan_ids.len());
        for id in &plan_ids {
            let entry = &per_query[id];
            if critiqued.contains(id) {
                prop_assert_eq!(entry.severity, Severity::Medium);
            } else {
                prop_assert_eq!(entry.feedback.as_str(), DEFAULT_FEEDBACK);
                prop_assert_eq!(entry.severity, Severity::Low);
            }
        }
        prop_assert_eq!(&merged.queries, &plan.queries);
    }
}

#[test]
fn merged_plan_survives_json() {
    let ids: BTreeSet<String> = ["q1", "q2"].iter().map(|s| (*s).to_string()).collect();
    let merged = CritiqueMerger::new()
        .merge_json(
            plan_of(&ids),
            r#"{"query_critiques": [{"query_id": "q1", "critique": "ok", "critique_severity": "High"}]}"#,
        )
        .unwrap();

    let text = serde_json::to_string(&merged).unwrap();
    let back: Plan = serde_json::from_str(&text).unwrap();

    assert_eq!(back, merged);
    assert_eq!(back.critique_for("q1").unwrap().severity, Severity::High);
}
