use crate::clock::secs_to_duration;
use chrono::{DateTime, Duration, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: f64 = 86_400.0;

/// Longest interval handed out, in days.
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

/// Self-assessed quality of a recall.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecallRating {
    /// Blackout; see it again shortly.
    Again,
    Hard,
    Good,
    Easy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulingResult {
    /// Days.
    pub interval: f64,
    pub next_review_date: DateTime<Local>,
}

/// Next interval and due date for a chunk reviewed at `now`.
///
/// A zero `current_interval` means the chunk has never graduated; each
/// rating then jumps to a fixed starting interval instead of scaling.
pub fn schedule(current_interval: f64, rating: RecallRating, now: DateTime<Local>) -> SchedulingResult {
    let (floor, factor) = match rating {
        RecallRating::Again => {
            return SchedulingResult {
                interval: 0.0,
                next_review_date: now + Duration::minutes(10),
            }
        }
        RecallRating::Hard => (1.0, 1.2),
        RecallRating::Good => (2.0, 2.0),
        RecallRating::Easy => (4.0, 2.7),
    };

    let interval = if current_interval == 0.0 {
        floor
    } else {
        f64::max(floor, (current_interval * factor).round())
    }
    .min(MAX_INTERVAL_DAYS);

    // Out of range only when `now` is already at the end of chrono's calendar.
    let next_review_date = now
        .checked_add_signed(secs_to_duration(interval * SECS_PER_DAY))
        .unwrap_or(now);

    SchedulingResult {
        interval,
        next_review_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 12, 8, 30, 0).unwrap()
    }

    #[test]
    fn again_comes_back_in_ten_minutes() {
        let r = schedule(0.0, RecallRating::Again, now());
        assert_eq!(r.interval, 0.0);
        assert_eq!(r.next_review_date, now() + Duration::seconds(600));

        let r = schedule(40.0, RecallRating::Again, now());
        assert_eq!(r.interval, 0.0);
    }

    #[test]
    fn first_reviews_use_fixed_intervals() {
        assert_eq!(schedule(0.0, RecallRating::Hard, now()).interval, 1.0);
        assert_eq!(schedule(0.0, RecallRating::Good, now()).interval, 2.0);
        assert_eq!(schedule(0.0, RecallRating::Easy, now()).interval, 4.0);
        assert_eq!(
            schedule(0.0, RecallRating::Good, now()).next_review_date,
            now() + Duration::days(2)
        );
    }

    #[test]
    fn graduated_intervals_scale_and_round() {
        assert_eq!(schedule(10.0, RecallRating::Easy, now()).interval, 27.0);
        assert_eq!(schedule(10.0, RecallRating::Good, now()).interval, 20.0);
        assert_eq!(schedule(10.0, RecallRating::Hard, now()).interval, 12.0);
        assert_eq!(schedule(3.0, RecallRating::Hard, now()).interval, 4.0);
    }

    #[test]
    fn floors_hold_at_low_intervals() {
        assert_eq!(schedule(1.0, RecallRating::Hard, now()).interval, 1.0);
        assert_eq!(schedule(0.5, RecallRating::Good, now()).interval, 2.0);
        assert_eq!(schedule(1.0, RecallRating::Easy, now()).interval, 4.0);
    }

    #[test]
    fn huge_intervals_are_capped() {
        let r = schedule(1e9, RecallRating::Easy, now());
        assert_eq!(r.interval, MAX_INTERVAL_DAYS);
        assert!(r.next_review_date > now());

        let r = schedule(f64::INFINITY, RecallRating::Good, now());
        assert_eq!(r.interval, MAX_INTERVAL_DAYS);
    }

    #[test]
    fn repeated_easy_ratings_level_off() {
        let mut interval = 0.0;
        for _ in 0..40 {
            interval = schedule(interval, RecallRating::Easy, now()).interval;
        }
        assert_eq!(interval, MAX_INTERVAL_DAYS);
    }

    #[test]
    fn due_date_follows_interval() {
        let r = schedule(10.0, RecallRating::Easy, now());
        assert_eq!(r.next_review_date, now() + Duration::days(27));
    }
}
