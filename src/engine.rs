use crate::clock::{secs_between, Clock};
use crate::constant::Constant;
use crate::digits::DigitSource;
use crate::persistence::HighestIndexPersistence;
use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// How the engine reacts to a wrong digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Sudden death: the first mistake ends the session.
    Strict,
    /// The correct digit is revealed and the session moves on.
    Learning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Ready,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Correct,
    Incorrect { expected: u8, actual: u8 },
    /// The digit source has no digit at the current index.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputResult {
    pub outcome: InputOutcome,
    pub expected_digit: Option<u8>,
    pub index_advanced: bool,
    pub current_index: usize,
    /// The input completed the segment and the position wrapped to its start.
    pub looped: bool,
}

impl InputResult {
    pub fn is_correct(&self) -> bool {
        self.outcome == InputOutcome::Correct
    }
}

/// Stretch of digits `[start, end)` drilled on repeat.
///
/// Bounds are multiples of [`Segment::GRANULARITY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub const GRANULARITY: usize = 10;

    /// Rounds both bounds down to the granularity; `None` if nothing is left.
    pub fn aligned(start: usize, end: usize) -> Option<Segment> {
        let start = start / Self::GRANULARITY * Self::GRANULARITY;
        let end = end / Self::GRANULARITY * Self::GRANULARITY;
        (end > start).then_some(Segment { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl Default for Segment {
    fn default() -> Self {
        Segment { start: 0, end: 50 }
    }
}

/// Validates sequential digit input against a [`DigitSource`].
///
/// The engine is created idle, armed by [`PracticeEngine::start`], and starts
/// its timer on the first [`PracticeEngine::input`]. A strict-mode mistake or
/// running out of digits finishes the session; nothing here ever fails.
#[derive(Debug)]
pub struct PracticeEngine<S, P, C> {
    constant: Constant,
    digits: S,
    persistence: P,
    clock: C,
    mode: Mode,
    state: EngineState,
    current_index: usize,
    attempts: usize,
    errors: usize,
    current_streak: usize,
    best_streak: usize,
    start_time: Option<DateTime<Local>>,
    accumulated_elapsed: f64,
    cumulative_times: Vec<f64>,
    segment: Option<Segment>,
    loops: usize,
}

impl<S, P, C> PracticeEngine<S, P, C>
where
    S: DigitSource,
    P: HighestIndexPersistence,
    C: Clock,
{
    pub fn new(constant: Constant, digits: S, persistence: P, clock: C) -> Self {
        Self {
            constant,
            digits,
            persistence,
            clock,
            mode: Mode::Strict,
            state: EngineState::Idle,
            current_index: 0,
            attempts: 0,
            errors: 0,
            current_streak: 0,
            best_streak: 0,
            start_time: None,
            accumulated_elapsed: 0.0,
            cumulative_times: Vec::new(),
            segment: None,
            loops: 0,
        }
    }

    pub fn start(&mut self, mode: Mode) {
        self.mode = mode;
        self.state = EngineState::Ready;
        self.clear_counters();
    }

    /// Like [`start`](Self::start), but input begins at `segment.start` and
    /// wraps back there each time `segment.end` is reached. The end is
    /// clamped to the digit source; a segment starting past it is ignored.
    pub fn start_segment(&mut self, mode: Mode, segment: Segment) {
        self.start(mode);
        let total = self.digits.total_digits();
        if segment.start >= total {
            debug!(
                "{}: segment {}..{} lies past the {total} available digits",
                self.constant, segment.start, segment.end
            );
            return;
        }
        let segment = Segment {
            start: segment.start,
            end: segment.end.min(total),
        };
        if segment.is_empty() {
            return;
        }
        self.current_index = segment.start;
        self.segment = Some(segment);
    }

    pub fn input(&mut self, digit: u8) -> InputResult {
        if self.state == EngineState::Ready {
            self.state = EngineState::Running;
            self.start_time = Some(self.clock.now());
        }

        if self.state != EngineState::Running {
            // Absorb misuse: report the pending digit without consuming it.
            let expected = self.digits.digit_at(self.current_index);
            let outcome = match expected {
                Some(expected) => InputOutcome::Incorrect {
                    expected,
                    actual: digit,
                },
                None => InputOutcome::Exhausted,
            };
            return InputResult {
                outcome,
                expected_digit: expected,
                index_advanced: false,
                current_index: self.current_index,
                looped: false,
            };
        }

        let Some(expected) = self.digits.digit_at(self.current_index) else {
            debug!(
                "{}: digit source exhausted at index {}",
                self.constant, self.current_index
            );
            self.finish();
            return InputResult {
                outcome: InputOutcome::Exhausted,
                expected_digit: None,
                index_advanced: false,
                current_index: self.current_index,
                looped: false,
            };
        };

        self.attempts += 1;

        let (outcome, index_advanced, looped) = if digit == expected {
            self.current_streak += 1;
            self.best_streak = self.best_streak.max(self.current_streak);
            if let Err(e) = self
                .persistence
                .record_highest_index(self.current_index, self.constant.key())
            {
                warn!("failed to record highest index for {}: {e}", self.constant);
            }
            let looped = self.advance();
            (InputOutcome::Correct, true, looped)
        } else {
            self.errors += 1;
            self.current_streak = 0;
            let outcome = InputOutcome::Incorrect {
                expected,
                actual: digit,
            };
            match self.mode {
                Mode::Strict => {
                    self.finish();
                    (outcome, false, false)
                }
                Mode::Learning => {
                    let looped = self.advance();
                    (outcome, true, looped)
                }
            }
        };

        InputResult {
            outcome,
            expected_digit: Some(expected),
            index_advanced,
            current_index: self.current_index,
            looped,
        }
    }

    /// Steps back one position, never before the segment start.
    pub fn backspace(&mut self) {
        let floor = self.segment_floor();
        if self.is_ready_or_running() && self.current_index > floor {
            self.current_index -= 1;
            self.cumulative_times.truncate(self.current_index - floor);
        }
    }

    /// Ends the session and freezes the elapsed time. No-op when idle.
    pub fn finish(&mut self) {
        if self.state == EngineState::Idle {
            return;
        }
        if self.state == EngineState::Running {
            self.pause_timer();
        }
        self.state = EngineState::Finished;
    }

    pub fn reset(&mut self) {
        self.finish();
        self.state = EngineState::Idle;
        self.clear_counters();
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_at(self.clock.now())
    }

    pub fn digits_per_minute(&self) -> f64 {
        let elapsed = self.elapsed_time();
        if elapsed <= 0.0 {
            return 0.0;
        }
        (self.attempts - self.errors) as f64 / (elapsed / 60.0)
    }

    pub fn constant(&self) -> Constant {
        self.constant
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn is_ready_or_running(&self) -> bool {
        matches!(self.state, EngineState::Ready | EngineState::Running)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn current_streak(&self) -> usize {
        self.current_streak
    }

    pub fn best_streak(&self) -> usize {
        self.best_streak
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    /// Seconds from session start at which each position was reached,
    /// counted from the segment start and cleared on every loop.
    pub fn cumulative_times(&self) -> &[f64] {
        &self.cumulative_times
    }

    pub fn segment(&self) -> Option<Segment> {
        self.segment
    }

    /// Completed passes through the segment.
    pub fn loops(&self) -> usize {
        self.loops
    }

    pub fn digits(&self) -> &S {
        &self.digits
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn elapsed_at(&self, now: DateTime<Local>) -> f64 {
        match self.start_time {
            Some(start) => self.accumulated_elapsed + secs_between(start, now),
            None => self.accumulated_elapsed,
        }
    }

    fn segment_floor(&self) -> usize {
        self.segment.map_or(0, |s| s.start)
    }

    /// Moves one position on; returns whether the segment wrapped.
    fn advance(&mut self) -> bool {
        let stamp = self.elapsed_at(self.clock.now());
        self.cumulative_times.push(stamp);
        self.current_index += 1;

        match self.segment {
            Some(segment) if self.current_index >= segment.end => {
                self.current_index = segment.start;
                self.cumulative_times.clear();
                self.loops += 1;
                debug!(
                    "{}: segment {}..{} completed, loop {}",
                    self.constant, segment.start, segment.end, self.loops
                );
                true
            }
            _ => false,
        }
    }

    fn pause_timer(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.accumulated_elapsed += secs_between(start, self.clock.now());
        }
    }

    fn clear_counters(&mut self) {
        self.current_index = 0;
        self.attempts = 0;
        self.errors = 0;
        self.current_streak = 0;
        self.best_streak = 0;
        self.start_time = None;
        self.accumulated_elapsed = 0.0;
        self.cumulative_times.clear();
        self.segment = None;
        self.loops = 0;
    }
}
