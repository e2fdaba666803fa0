use crate::frame::FrameSize;
use std::time::SystemTime;

/// Presentation statistics
#[derive(Debug, Clone, Default)]
pub struct DisplayStats {
    pub frames_presented: u64,
    pub present_errors: u64,
    pub empty_cycles: u64,
    pub last_frame_time: Option<SystemTime>,
    pub last_size: Option<FrameSize>,
}

impl DisplayStats {
    pub fn record_present(&mut self, size: FrameSize) {
        self.frames_presented += 1;
        self.last_frame_time = Some(SystemTime::now());
        self.last_size = Some(size);
    }

    pub fn record_present_error(&mut self) {
        self.present_errors += 1;
    }

    /// A cycle that produced no composite
    pub fn record_empty_cycle(&mut self) {
        self.empty_cycles += 1;
    }

    pub fn success_rate(&self) -> f64 {
        let attempts = self.frames_presented + self.present_errors;
        if attempts == 0 {
            0.0
        } else {
            self.frames_presented as f64 / attempts as f64
        }
    }
}
