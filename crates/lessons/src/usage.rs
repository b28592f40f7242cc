//! Per-endpoint token accounting

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use llm_core::UsageMetadata;
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointUsage {
    /// Model calls made while serving this endpoint
    pub calls: u64,
    /// Calls whose response carried no token counts
    pub calls_without_usage: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_call: Option<DateTime<Utc>>,
}

impl EndpointUsage {
    fn add(&mut self, usage: Option<UsageMetadata>) {
        self.calls += 1;
        match usage {
            Some(u) => {
                self.input_tokens += u.input_tokens;
                self.output_tokens += u.output_tokens;
                self.total_tokens += u.total_tokens;
            }
            None => self.calls_without_usage += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub endpoints: BTreeMap<String, EndpointUsage>,
    pub totals: EndpointUsage,
}

#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    inner: Arc<Mutex<BTreeMap<String, EndpointUsage>>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, endpoint: &str, usage: Option<UsageMetadata>) {
        let mut endpoints = self.inner.lock();
        let entry = endpoints.entry(endpoint.to_string()).or_default();
        entry.add(usage);
        entry.last_call = Some(Utc::now());
    }

    pub fn get(&self, endpoint: &str) -> Option<EndpointUsage> {
        self.inner.lock().get(endpoint).cloned()
    }

    pub fn report(&self) -> UsageReport {
        let endpoints = self.inner.lock().clone();
        let totals = endpoints
            .values()
            .fold(EndpointUsage::default(), |mut acc, e| {
                acc.calls += e.calls;
                acc.calls_without_usage += e.calls_without_usage;
                acc.input_tokens += e.input_tokens;
                acc.output_tokens += e.output_tokens;
                acc.total_tokens += e.total_tokens;
                acc.last_call = acc.last_call.max(e.last_call);
                acc
            });
        UsageReport { endpoints, totals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64) -> Option<UsageMetadata> {
        Some(UsageMetadata {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        })
    }

    #[test]
    fn test_record_and_report() {
        let tracker = UsageTracker::new();
        tracker.record("/api/basic", usage(10, 5));
        tracker.record("/api/basic", None);
        tracker.record("/api/basic3", usage(45, 32));

        let basic = tracker.get("/api/basic").unwrap();
        assert_eq!(basic.calls, 2);
        assert_eq!(basic.calls_without_usage, 1);
        assert_eq!(basic.total_tokens, 15);

        let report = tracker.report();
        assert_eq!(report.endpoints.len(), 2);
        assert_eq!(report.totals.calls, 3);
        assert_eq!(report.totals.input_tokens, 55);
        assert_eq!(report.totals.total_tokens, 92);
        assert!(report.totals.last_call.is_some());
    }

    #[test]
    fn test_clones_share_counts() {
        let tracker = UsageTracker::new();
        tracker.clone().record("/api/basic", usage(1, 1));
        assert_eq!(tracker.get("/api/basic").unwrap().calls, 1);
        assert!(tracker.get("/api/other").is_none());
    }
}
