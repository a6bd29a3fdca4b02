use crate::clock::secs_between;
use crate::records::PersonalBestRecord;
use chrono::{DateTime, Local};

/// Time-interpolated replay of a recorded run.
///
/// `position_at` is a pure function of the start instant and the sampled
/// instant, so callers may sample it as often as they like.
#[derive(Debug, Clone, PartialEq)]
pub struct GhostEngine {
    timestamps: Vec<f64>,
    start_time: Option<DateTime<Local>>,
}

impl GhostEngine {
    /// `timestamps[i]` is the second at which digit `i` was entered.
    pub fn new(timestamps: Vec<f64>) -> Self {
        Self {
            timestamps,
            start_time: None,
        }
    }

    pub fn from_record(record: &PersonalBestRecord) -> Self {
        Self::new(record.cumulative_times.clone())
    }

    /// Starts the replay clock. Only the first call has any effect.
    pub fn start(&mut self, now: DateTime<Local>) {
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
    }

    pub fn has_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    pub fn total_digits(&self) -> usize {
        self.timestamps.len()
    }

    /// Fractional digit position at `instant`; 0 before the start.
    pub fn position_at(&self, instant: DateTime<Local>) -> f64 {
        match self.start_time {
            Some(start) => self.position_after(secs_between(start, instant)),
            None => 0.0,
        }
    }

    /// Whether the replay has entered its last digit by `instant`.
    pub fn has_finished_at(&self, instant: DateTime<Local>) -> bool {
        self.has_started() && self.position_at(instant) >= self.total_digits() as f64
    }

    fn position_after(&self, elapsed: f64) -> f64 {
        if self.timestamps.is_empty() || elapsed <= 0.0 {
            return 0.0;
        }

        let mut segment_start = 0.0;
        for (i, &segment_end) in self.timestamps.iter().enumerate() {
            if elapsed <= segment_end {
                let duration = segment_end - segment_start;
                let progress = if duration > 0.0 {
                    (elapsed - segment_start) / duration
                } else {
                    1.0
                };
                return i as f64 + progress;
            }
            segment_start = segment_end;
        }

        self.timestamps.len() as f64
    }
}
