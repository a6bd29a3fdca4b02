use crate::clock::Clock;
use crate::digits::DigitSource;
use crate::engine::{InputResult, PracticeEngine};
use crate::ghost::GhostEngine;
use crate::persistence::HighestIndexPersistence;
use crate::records::{PersonalBestRecord, RecordKind};
use crate::session::SessionMode;
use chrono::{DateTime, Local};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Ahead,
    Behind,
    Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceEvent {
    Continue,
    /// The ghost finished its run before the player caught up.
    Defeated,
    /// A mistake after overtaking the ghost's whole run ends the game.
    VictoryStop,
    /// The engine finished on its own (sudden death or exhaustion).
    Finished,
}

/// Engine state captured just before the first mistake.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub index: usize,
    pub time: f64,
    pub cumulative_times: Vec<f64>,
}

/// What a finished session is worth.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionVerdict {
    pub certified: bool,
    /// Record candidates for both ledgers; the store decides whether they win.
    pub candidates: Vec<PersonalBestRecord>,
    pub was_victory: Option<bool>,
}

/// Drives a [`PracticeEngine`] for one session: starts and watches the ghost
/// in game mode, remembers the pre-mistake snapshot, and judges the result.
#[derive(Debug)]
pub struct Race {
    mode: SessionMode,
    ghost: Option<GhostEngine>,
    defeated: bool,
    reveals_used: usize,
    first_error: Option<Snapshot>,
}

impl Race {
    /// The ghost only races in game mode and only with a non-empty record.
    pub fn new(mode: SessionMode, ghost_record: Option<&PersonalBestRecord>) -> Self {
        let ghost = match ghost_record {
            Some(record) if mode.has_ghost() && !record.cumulative_times.is_empty() => {
                debug!(
                    "racing {} ghost of {} digits",
                    record.kind, record.digit_count
                );
                Some(GhostEngine::from_record(record))
            }
            Some(_) if mode.has_ghost() => {
                debug!("ghost skipped: record has no timestamps");
                None
            }
            _ => None,
        };
        Self {
            mode,
            ghost,
            defeated: false,
            reveals_used: 0,
            first_error: None,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn ghost(&self) -> Option<&GhostEngine> {
        self.ghost.as_ref()
    }

    pub fn is_defeated(&self) -> bool {
        self.defeated
    }

    pub fn first_error(&self) -> Option<&Snapshot> {
        self.first_error.as_ref()
    }

    pub fn reveal(&mut self, count: usize) {
        self.reveals_used += count;
    }

    pub fn reveals_used(&self) -> usize {
        self.reveals_used
    }

    pub fn input<S, P, C>(
        &mut self,
        engine: &mut PracticeEngine<S, P, C>,
        digit: u8,
    ) -> (InputResult, RaceEvent)
    where
        S: DigitSource,
        P: HighestIndexPersistence,
        C: Clock,
    {
        let index_before = engine.current_index();
        let result = engine.input(digit);
        let now = engine.clock().now();

        if result.index_advanced {
            if let Some(ghost) = self.ghost.as_mut() {
                ghost.start(now);
            }
        }

        if let Some(event) = self.check_defeat(engine, now) {
            return (result, event);
        }

        if !result.is_correct() && engine.is_active() {
            if self.first_error.is_none()
                && matches!(self.mode, SessionMode::Practice | SessionMode::Game)
                && self.reveals_used == 0
            {
                self.first_error = Some(Snapshot {
                    index: index_before,
                    time: engine.elapsed_time(),
                    cumulative_times: engine.cumulative_times().iter().take(index_before).copied().collect(),
                });
            }

            if self.mode == SessionMode::Game {
                let ghost_total = self.ghost.as_ref().map_or(0, GhostEngine::total_digits);
                if engine.current_index() > ghost_total {
                    info!(
                        "mistake after passing the ghost ({} > {ghost_total}), ending game",
                        engine.current_index()
                    );
                    engine.finish();
                    return (result, RaceEvent::VictoryStop);
                }
            }
        }

        if engine.is_active() {
            (result, RaceEvent::Continue)
        } else {
            (result, RaceEvent::Finished)
        }
    }

    /// Periodic check so the ghost can win while the player hesitates.
    pub fn tick<S, P, C>(&mut self, engine: &mut PracticeEngine<S, P, C>) -> RaceEvent
    where
        S: DigitSource,
        P: HighestIndexPersistence,
        C: Clock,
    {
        let now = engine.clock().now();
        self.check_defeat(engine, now)
            .unwrap_or(RaceEvent::Continue)
    }

    /// Correct progress with each mistake costing one digit.
    pub fn effective_position<S, P, C>(&self, engine: &PracticeEngine<S, P, C>) -> usize
    where
        S: DigitSource,
        P: HighestIndexPersistence,
        C: Clock,
    {
        engine.current_index().saturating_sub(engine.errors())
    }

    /// Positive when the player leads the ghost.
    pub fn delta<S, P, C>(&self, engine: &PracticeEngine<S, P, C>, now: DateTime<Local>) -> f64
    where
        S: DigitSource,
        P: HighestIndexPersistence,
        C: Clock,
    {
        match &self.ghost {
            Some(ghost) => self.effective_position(engine) as f64 - ghost.position_at(now),
            None => 0.0,
        }
    }

    pub fn standing<S, P, C>(&self, engine: &PracticeEngine<S, P, C>, now: DateTime<Local>) -> Standing
    where
        S: DigitSource,
        P: HighestIndexPersistence,
        C: Clock,
    {
        let delta = self.delta(engine, now);
        if delta > 0.0 {
            Standing::Ahead
        } else if delta < 0.0 {
            Standing::Behind
        } else {
            Standing::Level
        }
    }

    /// Judges a finished session and builds its record candidates.
    pub fn verdict<S, P, C>(&self, engine: &PracticeEngine<S, P, C>) -> SessionVerdict
    where
        S: DigitSource,
        P: HighestIndexPersistence,
        C: Clock,
    {
        let was_victory = (self.mode == SessionMode::Game).then(|| {
            let ghost_total = self.ghost.as_ref().map_or(0, GhostEngine::total_digits);
            !self.defeated && engine.current_index() >= ghost_total
        });

        let practice_pr = self.mode == SessionMode::Practice
            && (engine.errors() == 0 || self.first_error.is_some());
        let certified = self.reveals_used == 0
            && !self.defeated
            && match self.mode {
                SessionMode::Test | SessionMode::Game => true,
                SessionMode::Practice => practice_pr,
                SessionMode::Learn => false,
            };

        let mut candidates = Vec::new();
        if certified {
            let use_snapshot = matches!(self.mode, SessionMode::Practice | SessionMode::Game)
                && engine.errors() > 0;
            let (index, time, times) = match (&self.first_error, use_snapshot) {
                (Some(snap), true) => (snap.index, snap.time, snap.cumulative_times.clone()),
                _ => (
                    engine.current_index(),
                    engine.elapsed_time(),
                    engine.cumulative_times().to_vec(),
                ),
            };
            if index > 0 {
                let crown = PersonalBestRecord {
                    constant: engine.constant(),
                    kind: RecordKind::Crown,
                    digit_count: index,
                    total_time: time,
                    cumulative_times: times,
                    date: engine.clock().now(),
                };
                candidates.push(crown.as_kind(RecordKind::Lightning));
                candidates.insert(0, crown);
            }
        }

        SessionVerdict {
            certified,
            candidates,
            was_victory,
        }
    }

    fn check_defeat<S, P, C>(
        &mut self,
        engine: &mut PracticeEngine<S, P, C>,
        now: DateTime<Local>,
    ) -> Option<RaceEvent>
    where
        S: DigitSource,
        P: HighestIndexPersistence,
        C: Clock,
    {
        let ghost = self.ghost.as_ref()?;
        if self.defeated || !engine.is_active() {
            return None;
        }
        if ghost.has_finished_at(now) && engine.current_index() < ghost.total_digits() {
            info!(
                "ghost finished {} digits first; player at {}",
                ghost.total_digits(),
                engine.current_index()
            );
            self.defeated = true;
            engine.finish();
            return Some(RaceEvent::Defeated);
        }
        None
    }
}
