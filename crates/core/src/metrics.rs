use crate::access_widener::AccessWidenerStats;
use indexmap::IndexMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Annotation kinds in the order they are reported
pub const ANNOTATION_KINDS: [&str; 5] =
    ["@Accessor", "@Invoker", "@Inject", "@Redirect", "@ModifyArgs"];

#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub total_duration: Duration,
    pub phase_durations: IndexMap<String, Duration>,
    pub annotation_counts: IndexMap<String, usize>,
    pub mapping_entries: usize,
    pub inheritances: usize,
    pub written_entries: usize,
    pub access_widener: Option<AccessWidenerCounts>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AccessWidenerCounts {
    pub classes: usize,
    pub fields: usize,
    pub methods: usize,
}

impl From<AccessWidenerStats> for AccessWidenerCounts {
    fn from(stats: AccessWidenerStats) -> Self {
        Self {
            classes: stats.classes,
            fields: stats.fields,
            methods: stats.methods,
        }
    }
}

impl RunMetrics {
    pub fn annotation_count(&self, kind: &str) -> usize {
        self.annotation_counts.get(kind).copied().unwrap_or(0)
    }

    /// Operator-facing summary, one line per count
    pub fn summary(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .annotation_counts
            .iter()
            .map(|(kind, count)| format!("Processed {} {} annotations", count, kind))
            .collect();

        lines.push(format!("Processed {} mapping entries", self.mapping_entries));
        lines.push(format!("Cached {} inheritances", self.inheritances));
        if let Some(aw) = &self.access_widener {
            lines.push(format!("Remapped {} class accesswidener entries", aw.classes));
            lines.push(format!("Remapped {} field accesswidener entries", aw.fields));
            lines.push(format!("Remapped {} method accesswidener entries", aw.methods));
        }
        lines.push(format!("Written {} entries", self.written_entries));
        lines.push(format!("Everything took {} ms", self.total_duration.as_millis()));
        lines
    }
}

#[derive(Debug)]
pub struct MetricsCollector {
    start_time: Instant,
    phase_timers: IndexMap<String, Instant>,
    phase_durations: IndexMap<String, Duration>,
    annotation_counts: IndexMap<String, usize>,
    mapping_entries: usize,
    inheritances: usize,
    written_entries: usize,
    access_widener: Option<AccessWidenerCounts>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_timers: IndexMap::new(),
            phase_durations: IndexMap::new(),
            annotation_counts: ANNOTATION_KINDS.iter().map(|kind| (kind.to_string(), 0)).collect(),
            mapping_entries: 0,
            inheritances: 0,
            written_entries: 0,
            access_widener: None,
        }
    }

    pub fn start_phase(&mut self, phase: &str) {
        debug!("Starting phase: {}", phase);
        self.phase_timers.insert(phase.to_string(), Instant::now());
    }

    pub fn end_phase(&mut self, phase: &str) {
        if let Some(start_time) = self.phase_timers.shift_remove(phase) {
            let duration = start_time.elapsed();
            self.phase_durations.insert(phase.to_string(), duration);
            debug!("Phase {} completed in {:?}", phase, duration);
        }
    }

    pub fn record_annotation(&mut self, kind: &str) {
        *self.annotation_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_mapping_entries(&mut self, count: usize) {
        self.mapping_entries = count;
        debug!("Loaded {} mapping entries", count);
    }

    pub fn record_inheritances(&mut self, count: usize) {
        self.inheritances = count;
    }

    pub fn record_written_entries(&mut self, count: usize) {
        self.written_entries = count;
    }

    /// Counts add up across every access widener of the run
    pub fn record_access_widener(&mut self, stats: AccessWidenerStats) {
        let counts = self.access_widener.get_or_insert(AccessWidenerCounts {
            classes: 0,
            fields: 0,
            methods: 0,
        });
        counts.classes += stats.classes;
        counts.fields += stats.fields;
        counts.methods += stats.methods;
    }

    pub fn finalize(self) -> RunMetrics {
        let metrics = RunMetrics {
            total_duration: self.start_time.elapsed(),
            phase_durations: self.phase_durations,
            annotation_counts: self.annotation_counts,
            mapping_entries: self.mapping_entries,
            inheritances: self.inheritances,
            written_entries: self.written_entries,
            access_widener: self.access_widener,
        };

        Self::log_metrics(&metrics);
        metrics
    }

    fn log_metrics(metrics: &RunMetrics) {
        info!("Run summary:");
        for line in metrics.summary() {
            info!("  {}", line);
        }

        for (phase, duration) in &metrics.phase_durations {
            debug!("  {}: {:?}", phase, duration);
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
