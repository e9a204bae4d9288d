//! Service counters and their Prometheus text rendering.
//!
//! Counters are plain atomics bumped from the request handlers; the
//! `/metrics` endpoint renders a snapshot in the text exposition
//! format.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Counters exposed by the scheduling service.
#[derive(Debug, Default)]
pub struct Metrics {
    schedule_requests_total: AtomicU64,
    schedule_validation_failures_total: AtomicU64,
    schedule_planning_failures_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.schedule_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_failure(&self) {
        self.schedule_validation_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_planning_failure(&self) {
        self.schedule_planning_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Render the current counter values in Prometheus text format.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(
            "# HELP carbon_scheduler_schedule_requests_total Total schedule requests received.\n",
        );
        out.push_str("# TYPE carbon_scheduler_schedule_requests_total counter\n");
        out.push_str(&format!(
            "carbon_scheduler_schedule_requests_total {}\n",
            self.schedule_requests_total.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP carbon_scheduler_schedule_validation_failures_total Schedule requests rejected at validation.\n");
        out.push_str("# TYPE carbon_scheduler_schedule_validation_failures_total counter\n");
        out.push_str(&format!(
            "carbon_scheduler_schedule_validation_failures_total {}\n",
            self.schedule_validation_failures_total
                .load(Ordering::Relaxed)
        ));

        out.push_str("# HELP carbon_scheduler_schedule_planning_failures_total Schedule requests that failed in planning or upstream.\n");
        out.push_str("# TYPE carbon_scheduler_schedule_planning_failures_total counter\n");
        out.push_str(&format!(
            "carbon_scheduler_schedule_planning_failures_total {}\n",
            self.schedule_planning_failures_total
                .load(Ordering::Relaxed)
        ));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_contains_all_counters() {
        let metrics = Metrics::new();
        let text = metrics.render();

        assert!(text.contains("carbon_scheduler_schedule_requests_total 0"));
        assert!(text.contains("carbon_scheduler_schedule_validation_failures_total 0"));
        assert!(text.contains("carbon_scheduler_schedule_planning_failures_total 0"));
        assert!(text.contains("# TYPE carbon_scheduler_schedule_requests_total counter"));
    }

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_validation_failure();

        let text = metrics.render();
        assert!(text.contains("carbon_scheduler_schedule_requests_total 2"));
        assert!(text.contains("carbon_scheduler_schedule_validation_failures_total 1"));
        assert!(text.contains("carbon_scheduler_schedule_planning_failures_total 0"));
    }
}
