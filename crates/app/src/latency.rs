//! Per-turn latency checkpoints, reported as deltas once the turn ends.

use std::time::Instant;

pub struct LatencyTrace {
    start: Instant,
    marks: Vec<(&'static str, Instant)>,
}

impl LatencyTrace {
    pub fn begin() -> Self {
        Self {
            start: Instant::now(),
            marks: Vec::new(),
        }
    }

    pub fn mark(&mut self, label: &'static str) {
        self.marks.push((label, Instant::now()));
    }

    pub fn report(&self) {
        let mut prev = self.start;
        for (label, at) in &self.marks {
            tracing::debug!(
                stage = label,
                elapsed_ms = at.duration_since(prev).as_millis() as u64,
                total_ms = at.duration_since(self.start).as_millis() as u64,
                "turn latency"
            );
            prev = *at;
        }
    }
}
