use std::time::Duration;

/// Annotation counters for the run summary
#[derive(Debug, Clone, Default)]
pub struct DetectionStats {
    pub frames_annotated: u64,
    pub total_detections: u64,
    pub failures: u64,
    pub placeholders_skipped: u64,
    pub last_detection_count: usize,
    total_latency: Duration,
}

impl DetectionStats {
    pub fn record_success(&mut self, detection_count: usize, latency: Duration) {
        self.frames_annotated += 1;
        self.total_detections += detection_count as u64;
        self.last_detection_count = detection_count;
        self.total_latency += latency;
    }

    pub fn record_failure(&mut self, latency: Duration) {
        self.frames_annotated += 1;
        self.failures += 1;
        self.last_detection_count = 0;
        self.total_latency += latency;
    }

    pub fn record_placeholder_skip(&mut self) {
        self.placeholders_skipped += 1;
    }

    /// Mean detector round trip over every annotated frame
    pub fn average_latency(&self) -> Duration {
        if self.frames_annotated == 0 {
            Duration::ZERO
        } else {
            self.total_latency.div_f64(self.frames_annotated as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_latency() {
        let mut stats = DetectionStats::default();
        assert_eq!(stats.average_latency(), Duration::ZERO);

        stats.record_success(2, Duration::from_millis(10));
        stats.record_failure(Duration::from_millis(30));
        assert_eq!(stats.average_latency(), Duration::from_millis(20));
        assert_eq!((stats.frames_annotated, stats.failures), (2, 1));
    }

    #[test]
    fn test_average_latency_past_u32_frames() {
        let stats = DetectionStats {
            frames_annotated: (1 << 32) + 1,
            total_latency: Duration::from_millis((1 << 32) + 1),
            ..DetectionStats::default()
        };
        let avg = stats.average_latency();
        assert!(avg >= Duration::from_micros(999) && avg <= Duration::from_micros(1001));
    }
}
