//! Fixture helpers for the simulated backends

use seeker_core::Record;
use std::time::Duration;

/// Cap for fixtures that repeat a base set to fill the result
pub(crate) const REPEATING_CAP: usize = 100;

/// Cap for generic fallback fixtures
pub(crate) const GENERIC_CAP: usize = 10;

/// Cycle `base` up to `min(max_results, REPEATING_CAP)` records, letting `vary` stamp each copy
pub(crate) fn repeat<F>(base: &[Record], max_results: usize, mut vary: F) -> Vec<Record>
where
    F: FnMut(&mut Record, usize),
{
    let cap = max_results.min(REPEATING_CAP);
    base.iter()
        .cycle()
        .take(if base.is_empty() { 0 } else { cap })
        .enumerate()
        .map(|(i, record)| {
            let mut copy = record.clone();
            vary(&mut copy, i);
            copy
        })
        .collect()
}

/// Deterministic time of day spread over a day, `HH:MM:SS`
pub(crate) fn clock(index: usize) -> String {
    let hours = (index * 7 + 3) % 24;
    let minutes = (index * 13) % 60;
    let seconds = (index * 29) % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Simulated network round trip
pub(crate) async fn pause(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeat_caps_at_hundred() {
        let base = vec![json!({"a": 1}), json!({"a": 2})];
        assert_eq!(repeat(&base, 1000, |_, _| {}).len(), REPEATING_CAP);
        assert_eq!(repeat(&base, 3, |_, _| {}).len(), 3);
        assert!(repeat(&[], 50, |_, _| {}).is_empty());
    }

    #[test]
    fn clock_is_well_formed() {
        for i in 0..200 {
            let c = clock(i);
            assert_eq!(c.len(), 8);
            let parts: Vec<u32> = c.split(':').map(|p| p.parse().unwrap()).collect();
            assert!(parts[0] < 24 && parts[1] < 60 && parts[2] < 60);
        }
    }
}
