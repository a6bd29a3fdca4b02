// One interactive practice session: keystrokes in, engine and ghost race
// driven, results filed into the record and history stores at the end.

use crate::clock::Clock;
use crate::constant::Constant;
use crate::digits::DigitSource;
use crate::engine::{InputOutcome, InputResult, PracticeEngine, Segment};
use crate::history::DailyStreak;
use crate::persistence::{HighestIndexPersistence, HistoryPersistence, RecordPersistence};
use crate::race::{Race, RaceEvent, SessionVerdict, Standing};
use crate::records::{PersonalBestRecord, PersonalBestStore, RecordKind};
use crate::runtime::{Command, TrainerEvent};
use crate::session::{SessionMode, SessionRecord};
use log::{info, warn};

/// Digits of typed history kept on the status line.
const TAIL: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// Everything a finished session produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// `None` when nothing was typed.
    pub record: Option<SessionRecord>,
    pub verdict: SessionVerdict,
    pub new_records: Vec<RecordKind>,
    pub daily_streak: Option<DailyStreak>,
}

pub struct Trainer<S, P, C> {
    mode: SessionMode,
    engine: PracticeEngine<S, P, C>,
    race: Race,
    last: Option<InputResult>,
    revealed: Option<u8>,
}

impl<S, P, C> Trainer<S, P, C>
where
    S: DigitSource,
    P: HighestIndexPersistence,
    C: Clock,
{
    /// Starts a session; `ghost` is only raced in game mode.
    pub fn new(
        constant: Constant,
        mode: SessionMode,
        digits: S,
        persistence: P,
        clock: C,
        ghost: Option<&PersonalBestRecord>,
    ) -> Self {
        let mut engine = PracticeEngine::new(constant, digits, persistence, clock);
        engine.start(mode.engine_mode());
        Self {
            mode,
            engine,
            race: Race::new(mode, ghost),
            last: None,
            revealed: None,
        }
    }

    /// Restarts a learn session on `segment`; other modes keep the full run.
    pub fn with_segment(mut self, segment: Segment) -> Self {
        if self.mode == SessionMode::Learn {
            self.engine.start_segment(self.mode.engine_mode(), segment);
        }
        self
    }

    pub fn handle(&mut self, event: &TrainerEvent) -> Flow {
        match event {
            TrainerEvent::Tick => match self.race.tick(&mut self.engine) {
                RaceEvent::Continue => Flow::Continue,
                _ => Flow::Done,
            },
            TrainerEvent::Key(key) => match Command::from_key(key) {
                Some(command) => self.apply(command),
                None => Flow::Continue,
            },
        }
    }

    pub fn apply(&mut self, command: Command) -> Flow {
        match command {
            Command::Digit(digit) => {
                self.revealed = None;
                let (result, event) = self.race.input(&mut self.engine, digit);
                self.last = Some(result);
                if event == RaceEvent::Continue && self.engine.is_ready_or_running() {
                    Flow::Continue
                } else {
                    Flow::Done
                }
            }
            Command::Backspace => {
                self.revealed = None;
                self.engine.backspace();
                Flow::Continue
            }
            Command::Reveal => {
                if self.mode.allows_reveal() {
                    self.race.reveal(1);
                    self.revealed = self.engine.digits().digit_at(self.engine.current_index());
                }
                Flow::Continue
            }
            Command::Quit => {
                self.engine.finish();
                Flow::Done
            }
        }
    }

    pub fn engine(&self) -> &PracticeEngine<S, P, C> {
        &self.engine
    }

    pub fn race(&self) -> &Race {
        &self.race
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn last_result(&self) -> Option<&InputResult> {
        self.last.as_ref()
    }

    /// One-line rendering of the session for the terminal.
    pub fn status_line(&self) -> String {
        let engine = &self.engine;
        let constant = engine.constant();
        let index = engine.current_index();
        let floor = engine.segment().map_or(0, |s| s.start);
        let start = index.saturating_sub(TAIL).max(floor);
        let typed: String = (start..index)
            .filter_map(|i| engine.digits().digit_at(i))
            .map(|d| char::from(b'0' + d))
            .collect();
        let lead = if start == 0 {
            format!("{}.", constant.integer_part())
        } else {
            "…".to_string()
        };

        let mut line = format!(
            "{} {lead}{typed}  [{index} digits, {} errors, {:.1} dpm]",
            constant.symbol(),
            engine.errors(),
            engine.digits_per_minute()
        );

        if let Some(segment) = engine.segment() {
            line.push_str(&format!(
                "  segment {}-{}, loop {}",
                segment.start,
                segment.end,
                engine.loops() + 1
            ));
        }

        if self.mode.shows_permanent_overlay() {
            if let Some(next) = engine.digits().digit_at(index) {
                line.push_str(&format!("  next {next}"));
            }
        } else if let Some(digit) = self.revealed {
            line.push_str(&format!("  hint {digit}"));
        }

        if let Some(InputOutcome::Incorrect { expected, actual }) = self.last.map(|r| r.outcome) {
            line.push_str(&format!("  ✗ {actual} (was {expected})"));
        }

        if self.race.ghost().is_some() {
            let now = engine.clock().now();
            let delta = self.race.delta(engine, now);
            let standing = match self.race.standing(engine, now) {
                Standing::Ahead => "ahead of",
                Standing::Behind => "behind",
                Standing::Level => "level with",
            };
            line.push_str(&format!("  {standing} ghost ({delta:+.1})"));
        }
        line
    }

    /// Ends the session and files its results.
    pub fn conclude<R, H>(
        &mut self,
        records: &mut PersonalBestStore<R>,
        history: &H,
    ) -> SessionSummary
    where
        R: RecordPersistence,
        H: HistoryPersistence,
    {
        self.engine.finish();
        let verdict = self.race.verdict(&self.engine);

        let new_records = verdict
            .candidates
            .iter()
            .filter(|candidate| records.submit((*candidate).clone()))
            .map(|candidate| candidate.kind)
            .collect();

        if self.engine.attempts() == 0 {
            return SessionSummary {
                record: None,
                verdict,
                new_records,
                daily_streak: None,
            };
        }

        let record = SessionRecord::from_engine(&self.engine, self.mode, verdict.was_victory);
        if let Err(e) = history.append_session(&record) {
            warn!("failed to save session history: {e}");
        }

        let now = self.engine.clock().now();
        let daily_streak = match history.load_daily_streak() {
            Ok(mut streak) => {
                streak.record_session(now);
                if let Err(e) = history.save_daily_streak(&streak) {
                    warn!("failed to save daily streak: {e}");
                }
                Some(streak)
            }
            Err(e) => {
                warn!("failed to load daily streak: {e}");
                None
            }
        };

        info!(
            "{} {} session: {} digits, {} errors over {:.1}s",
            record.constant,
            record.mode,
            record.correct_digits(),
            record.errors,
            record.duration_secs
        );

        SessionSummary {
            record: Some(record),
            verdict,
            new_records,
            daily_streak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::digits::DigitBuffer;
    use crate::persistence::MemoryStore;
    use chrono::{Local, TimeZone};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn clock() -> ManualClock {
        ManualClock::new(Local.with_ymd_and_hms(2026, 4, 2, 18, 0, 0).unwrap())
    }

    fn digits() -> DigitBuffer {
        DigitBuffer::parse("14159265358979").unwrap()
    }

    fn key(c: char) -> TrainerEvent {
        TrainerEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn test_session_files_a_crown_record() {
        let store = MemoryStore::default();
        let clock = clock();
        let mut trainer = Trainer::new(Constant::Pi, SessionMode::Test, digits(), &store, &clock, None);

        for c in "14159".chars() {
            clock.advance_secs_f64(0.5);
            assert_eq!(trainer.handle(&key(c)), Flow::Continue);
        }
        clock.advance_secs_f64(0.5);
        assert_eq!(trainer.handle(&key('0')), Flow::Done);

        let mut records = PersonalBestStore::new(&store);
        let summary = trainer.conclude(&mut records, &store);
        assert!(summary.verdict.certified);
        assert_eq!(summary.new_records, vec![RecordKind::Crown]);
        assert_eq!(records.best_score(Constant::Pi), 5);

        let record = summary.record.unwrap();
        assert_eq!(record.attempts, 6);
        assert_eq!(record.errors, 1);
        assert_eq!(store.load_history(Constant::Pi).unwrap().len(), 1);
        assert_eq!(summary.daily_streak.map(|s| s.current), Some(1));
    }

    #[test]
    fn test_quit_before_typing_files_nothing() {
        let store = MemoryStore::default();
        let clock = clock();
        let mut trainer = Trainer::new(Constant::Pi, SessionMode::Practice, digits(), &store, &clock, None);
        let esc = TrainerEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(trainer.handle(&esc), Flow::Done);

        let mut records = PersonalBestStore::new(&store);
        let summary = trainer.conclude(&mut records, &store);
        assert!(summary.record.is_none());
        assert!(summary.new_records.is_empty());
        assert!(store.load_history(Constant::Pi).unwrap().is_empty());
    }

    #[test]
    fn test_reveal_voids_practice_records() {
        let store = MemoryStore::default();
        let clock = clock();
        let mut trainer = Trainer::new(Constant::Pi, SessionMode::Practice, digits(), &store, &clock, None);
        trainer.apply(Command::Reveal);
        assert!(trainer.status_line().contains("hint 1"));
        clock.advance_secs_f64(1.0);
        trainer.apply(Command::Digit(1));
        trainer.apply(Command::Quit);

        let mut records = PersonalBestStore::new(&store);
        let summary = trainer.conclude(&mut records, &store);
        assert!(!summary.verdict.certified);
        assert!(summary.new_records.is_empty());
    }

    #[test]
    fn test_reveal_is_ignored_in_test_mode() {
        let store = MemoryStore::default();
        let clock = clock();
        let mut trainer = Trainer::new(Constant::Pi, SessionMode::Test, digits(), &store, &clock, None);
        trainer.apply(Command::Reveal);
        assert_eq!(trainer.race().reveals_used(), 0);
        assert!(!trainer.status_line().contains("hint"));
    }

    #[test]
    fn test_status_line_shows_progress() {
        let store = MemoryStore::default();
        let clock = clock();
        let mut trainer = Trainer::new(Constant::Pi, SessionMode::Learn, digits(), &store, &clock, None);
        for d in [1, 4, 1] {
            clock.advance_secs_f64(1.0);
            trainer.apply(Command::Digit(d));
        }
        let line = trainer.status_line();
        assert!(line.starts_with("π 3.141"));
        assert!(line.contains("next 5"));

        trainer.apply(Command::Digit(9));
        assert!(trainer.status_line().contains("✗ 9 (was 5)"));
    }

    #[test]
    fn test_ghost_defeats_idle_player() {
        let store = MemoryStore::default();
        let clock = clock();
        let ghost = PersonalBestRecord {
            constant: Constant::Pi,
            kind: RecordKind::Crown,
            digit_count: 3,
            total_time: 3.0,
            cumulative_times: vec![1.0, 2.0, 3.0],
            date: clock.now(),
        };
        let mut trainer =
            Trainer::new(Constant::Pi, SessionMode::Game, digits(), &store, &clock, Some(&ghost));

        clock.advance_secs_f64(0.5);
        assert_eq!(trainer.apply(Command::Digit(1)), Flow::Continue);
        assert!(trainer.status_line().contains("ahead of ghost"));

        clock.advance_secs_f64(10.0);
        assert_eq!(trainer.handle(&TrainerEvent::Tick), Flow::Done);
        assert!(trainer.race().is_defeated());

        let mut records = PersonalBestStore::new(&store);
        let summary = trainer.conclude(&mut records, &store);
        assert_eq!(summary.verdict.was_victory, Some(false));
        assert!(summary.new_records.is_empty());
    }

    #[test]
    fn test_learn_segment_loops_back() {
        let store = MemoryStore::default();
        let clock = clock();
        let mut trainer = Trainer::new(Constant::Pi, SessionMode::Learn, digits(), &store, &clock, None)
            .with_segment(Segment { start: 10, end: 20 });
        assert_eq!(trainer.engine().current_index(), 10);
        // the buffer holds 14 digits, so the segment ends there
        let line = trainer.status_line();
        assert!(line.contains("segment 10-14, loop 1"));
        assert!(line.contains("next 8"));

        for d in [8, 9, 7] {
            clock.advance_secs_f64(1.0);
            assert_eq!(trainer.apply(Command::Digit(d)), Flow::Continue);
        }
        assert!(trainer.status_line().starts_with("π …897"));

        clock.advance_secs_f64(1.0);
        assert_eq!(trainer.apply(Command::Digit(9)), Flow::Continue);
        assert!(trainer.last_result().unwrap().looped);
        assert_eq!(trainer.engine().current_index(), 10);
        assert!(trainer.status_line().contains("loop 2"));

        trainer.apply(Command::Quit);
        let mut records = PersonalBestStore::new(&store);
        let summary = trainer.conclude(&mut records, &store);
        let record = summary.record.unwrap();
        assert_eq!(record.loops, 1);
        assert_eq!(record.segment, Some(Segment { start: 10, end: 14 }));
        assert_eq!(store.load_history(Constant::Pi).unwrap()[0].loops, 1);
    }

    #[test]
    fn test_segment_only_applies_to_learn_mode() {
        let store = MemoryStore::default();
        let clock = clock();
        let trainer = Trainer::new(Constant::Pi, SessionMode::Test, digits(), &store, &clock, None)
            .with_segment(Segment { start: 10, end: 20 });
        assert_eq!(trainer.engine().segment(), None);
        assert_eq!(trainer.engine().current_index(), 0);
        assert!(!trainer.status_line().contains("segment"));
    }
}
