use super::SentryOrchestrator;
use crate::alert::AlertCounters;
use crate::camera::SourceStatusSnapshot;
use std::fmt;
use std::time::Duration;

/// Statistics reported when the process shuts down normally
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub connected_sources: usize,
    pub total_sources: usize,
    pub frames_published: u64,
    pub frames_annotated: u64,
    pub total_detections: u64,
    pub detection_failures: u64,
    pub average_annotation_latency: Duration,
    pub alerts_dispatched: u64,
    pub alerts_suppressed: u64,
    pub alerts_dropped: u64,
    pub presentation_cycles: u64,
    pub average_cycle_time: Duration,
    pub frames_presented: u64,
    pub skew_warnings: u64,
    pub runtime: Duration,
}

impl RunSummary {
    /// Share of sources streaming at shutdown, in percent
    pub fn connection_rate(&self) -> f64 {
        if self.total_sources == 0 {
            0.0
        } else {
            self.connected_sources as f64 * 100.0 / self.total_sources as f64
        }
    }
}

/// `HH:MM:SS`, hours not wrapped at 24
pub fn format_runtime(runtime: Duration) -> String {
    let secs = runtime.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  Connected sources: {}/{} ({:.1}%)",
            self.connected_sources,
            self.total_sources,
            self.connection_rate()
        )?;
        writeln!(f, "  Frames published: {}", self.frames_published)?;
        writeln!(
            f,
            "  Detections: {} in {} annotated frames ({} failed), avg latency {:.1} ms",
            self.total_detections,
            self.frames_annotated,
            self.detection_failures,
            self.average_annotation_latency.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "  Alerts: {} dispatched, {} suppressed, {} dropped",
            self.alerts_dispatched, self.alerts_suppressed, self.alerts_dropped
        )?;
        writeln!(
            f,
            "  Presentation: {} cycles (avg {:.1} ms), {} frames shown, {} sync warnings",
            self.presentation_cycles,
            self.average_cycle_time.as_secs_f64() * 1000.0,
            self.frames_presented,
            self.skew_warnings
        )?;
        write!(f, "  Runtime: {}", format_runtime(self.runtime))
    }
}

impl SentryOrchestrator {
    pub(super) fn collect_summary(&self, snapshots: &[SourceStatusSnapshot]) -> RunSummary {
        let mut summary = RunSummary {
            connected_sources: snapshots.iter().filter(|s| s.state.is_streaming()).count(),
            total_sources: snapshots.len(),
            frames_published: snapshots.iter().map(|s| s.frames_published).sum(),
            runtime: self
                .started_at
                .map(|at| at.elapsed())
                .unwrap_or_default(),
            ..RunSummary::default()
        };

        if let Some(presentation) = &self.presentation {
            let detection = presentation.detection_stats();
            summary.frames_annotated = detection.frames_annotated;
            summary.total_detections = detection.total_detections;
            summary.detection_failures = detection.failures;
            summary.average_annotation_latency = detection.average_latency();
            let pacing = presentation.pacing_stats();
            summary.presentation_cycles = pacing.cycles;
            summary.average_cycle_time = pacing.average_cycle_time();
            summary.frames_presented = presentation.display_stats().frames_presented;
            summary.skew_warnings = presentation.skew_warnings();
        }

        if let Some(counters) = &self.alert_counters {
            summary.alerts_dispatched = AlertCounters::get(&counters.dispatched);
            summary.alerts_suppressed = AlertCounters::get(&counters.suppressed);
            summary.alerts_dropped = AlertCounters::get(&counters.dropped);
        }

        summary
    }
}
