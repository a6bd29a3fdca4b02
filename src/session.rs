use crate::clock::Clock;
use crate::constant::Constant;
use crate::digits::DigitSource;
use crate::engine::{Mode, PracticeEngine, Segment};
use crate::persistence::HighestIndexPersistence;
use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};

/// User-facing session modes, layered on top of the engine's [`Mode`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionMode {
    /// Errors allowed, upcoming digits visible.
    #[default]
    Learn,
    /// Errors allowed, no overlay.
    Practice,
    /// Sudden death.
    Test,
    /// Race against a personal-best ghost.
    Game,
}

impl SessionMode {
    pub fn allows_errors(&self) -> bool {
        !matches!(self, SessionMode::Test)
    }

    pub fn shows_permanent_overlay(&self) -> bool {
        matches!(self, SessionMode::Learn)
    }

    pub fn allows_reveal(&self) -> bool {
        matches!(self, SessionMode::Learn | SessionMode::Practice)
    }

    pub fn has_ghost(&self) -> bool {
        matches!(self, SessionMode::Game)
    }

    pub fn penalizes_errors(&self) -> bool {
        matches!(self, SessionMode::Game)
    }

    pub fn engine_mode(&self) -> Mode {
        match self {
            SessionMode::Test => Mode::Strict,
            SessionMode::Learn | SessionMode::Practice | SessionMode::Game => Mode::Learning,
        }
    }
}

// "strict" is what the test mode used to be called; anything unknown falls
// back to the default mode rather than failing the whole config.
impl<'de> Deserialize<'de> for SessionMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "learn" => SessionMode::Learn,
            "practice" => SessionMode::Practice,
            "test" | "strict" => SessionMode::Test,
            "game" => SessionMode::Game,
            _ => SessionMode::default(),
        })
    }
}

/// Summary of one finished session, as kept in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub date: DateTime<Local>,
    pub constant: Constant,
    pub mode: SessionMode,
    pub attempts: usize,
    pub errors: usize,
    pub best_streak: usize,
    pub duration_secs: f64,
    pub digits_per_minute: f64,
    /// Only set for game sessions.
    pub was_victory: Option<bool>,
    /// Drilled segment, learn sessions only.
    #[serde(default)]
    pub segment: Option<Segment>,
    #[serde(default)]
    pub loops: usize,
}

impl SessionRecord {
    pub fn from_engine<S, P, C>(
        engine: &PracticeEngine<S, P, C>,
        mode: SessionMode,
        was_victory: Option<bool>,
    ) -> Self
    where
        S: DigitSource,
        P: HighestIndexPersistence,
        C: Clock,
    {
        Self {
            date: engine.clock().now(),
            constant: engine.constant(),
            mode,
            attempts: engine.attempts(),
            errors: engine.errors(),
            best_streak: engine.best_streak(),
            duration_secs: engine.elapsed_time(),
            digits_per_minute: engine.digits_per_minute(),
            was_victory,
            segment: engine.segment(),
            loops: engine.loops(),
        }
    }

    pub fn correct_digits(&self) -> usize {
        self.attempts - self.errors
    }

    /// Percentage of correct attempts, 0 when nothing was typed.
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        (self.correct_digits() as f64 / self.attempts as f64) * 100.0
    }
}
