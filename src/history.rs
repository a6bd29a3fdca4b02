use crate::session::SessionRecord;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Sessions kept per constant; older ones are dropped.
pub const MAX_HISTORY: usize = 200;

/// Consecutive calendar days with at least one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailyStreak {
    pub current: u32,
    pub last_practice: Option<DateTime<Local>>,
}

impl DailyStreak {
    pub fn record_session(&mut self, now: DateTime<Local>) {
        let today = now.date_naive();
        self.current = match self.last_practice.map(|d| d.date_naive()) {
            Some(last) if last == today => self.current.max(1),
            Some(last) if today.pred_opt() == Some(last) => self.current + 1,
            _ => 1,
        };
        self.last_practice = Some(now);
    }

    /// Zeroes a streak that was not kept up yesterday or today.
    pub fn refresh(&mut self, now: DateTime<Local>) {
        let Some(last) = self.last_practice.map(|d| d.date_naive()) else {
            return;
        };
        let today = now.date_naive();
        if last != today && today.pred_opt() != Some(last) {
            self.current = 0;
        }
    }
}

/// Aggregate view over a slice of session history.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HistorySummary {
    pub sessions: usize,
    pub correct_digits: usize,
    pub mean_dpm: f64,
    pub best_dpm: f64,
    pub best_streak: usize,
    pub accuracy: f64,
}

impl HistorySummary {
    pub fn from_records(records: &[SessionRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let attempts: usize = records.iter().map(|r| r.attempts).sum();
        let correct_digits: usize = records.iter().map(SessionRecord::correct_digits).sum();
        let mean_dpm =
            records.iter().map(|r| r.digits_per_minute).sum::<f64>() / records.len() as f64;
        let best_dpm = records
            .iter()
            .map(|r| r.digits_per_minute)
            .fold(0.0, f64::max);
        let accuracy = if attempts == 0 {
            0.0
        } else {
            ((correct_digits as f64 / attempts as f64) * 100.0).round()
        };

        Self {
            sessions: records.len(),
            correct_digits,
            mean_dpm,
            best_dpm,
            best_streak: records.iter().map(|r| r.best_streak).max().unwrap_or(0),
            accuracy,
        }
    }
}
