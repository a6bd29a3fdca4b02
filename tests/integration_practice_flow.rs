// End-to-end flows over the public library surface, persisted to SQLite in a
// temporary directory.

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, Local, TimeZone};
use pitrain::clock::{Clock, ManualClock};
use pitrain::constant::Constant;
use pitrain::digits::DigitBuffer;
use pitrain::engine::{EngineState, InputOutcome, Mode, PracticeEngine};
use pitrain::learning::{ChunkState, LearningConfig, LearningStore};
use pitrain::persistence::{HighestIndexPersistence, HistoryPersistence};
use pitrain::records::{PersonalBestStore, RecordKind};
use pitrain::scheduler::RecallRating;
use pitrain::session::{SessionMode, SessionRecord};
use pitrain::stats::StatsDb;
use pitrain::trainer::Trainer;

fn morning() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 6, 1, 7, 30, 0).unwrap()
}

#[test]
fn strict_run_of_five_digits_then_mistake() {
    let dir = tempfile::tempdir().unwrap();
    let db = StatsDb::open(dir.path().join("pitrain.db")).unwrap();
    let clock = ManualClock::new(morning());
    let mut engine = PracticeEngine::new(
        Constant::Pi,
        DigitBuffer::parse("14159").unwrap(),
        &db,
        &clock,
    );

    engine.start(Mode::Strict);
    for d in [1, 4, 1, 5, 9] {
        clock.advance_secs_f64(1.0);
        assert!(engine.input(d).is_correct());
    }
    assert_eq!(db.read_highest_index("pi").unwrap(), 4);

    clock.advance_secs_f64(1.0);
    let r = engine.input(2);
    assert_matches!(r.outcome, InputOutcome::Exhausted);
    assert_eq!(r.expected_digit, None);
    assert_eq!(engine.state(), EngineState::Finished);
    assert_eq!(engine.attempts(), 5);
    assert_eq!(engine.errors(), 0);
}

#[test]
fn learning_run_keeps_going_after_mistakes() {
    let db = StatsDb::open_in_memory().unwrap();
    let clock = ManualClock::new(morning());
    let mut engine = PracticeEngine::new(
        Constant::Pi,
        DigitBuffer::parse("14159").unwrap(),
        &db,
        &clock,
    );

    engine.start(Mode::Learning);
    let outcomes: Vec<bool> = [1, 4, 2, 5, 9]
        .into_iter()
        .map(|d| {
            clock.advance_secs_f64(0.5);
            engine.input(d).is_correct()
        })
        .collect();
    assert_eq!(outcomes, vec![true, true, false, true, true]);
    assert_eq!(engine.current_index(), 5);
    assert_eq!(engine.errors(), 1);
    assert_eq!(engine.best_streak(), 2);
    assert!(engine.is_active());

    engine.finish();
    let record = SessionRecord::from_engine(&engine, SessionMode::Learn, None);
    assert_eq!(record.correct_digits(), 4);
    assert_eq!(record.accuracy(), 80.0);
}

#[test]
fn records_and_history_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pitrain.db");
    let clock = ManualClock::new(morning());

    {
        let db = StatsDb::open(&path).unwrap();
        let mut trainer = Trainer::new(
            Constant::Sqrt2,
            SessionMode::Practice,
            DigitBuffer::bundled(Constant::Sqrt2).unwrap(),
            &db,
            &clock,
            None,
        );
        // 4142 correct, then a slip
        for d in [4, 1, 4, 2, 0] {
            clock.advance_secs_f64(0.5);
            trainer.apply(pitrain::runtime::Command::Digit(d));
        }
        let mut records = PersonalBestStore::new(&db);
        let summary = trainer.conclude(&mut records, &db);
        assert!(summary.verdict.certified);
        assert_eq!(summary.new_records, vec![RecordKind::Crown]);
    }

    let db = StatsDb::open(&path).unwrap();
    let mut records = PersonalBestStore::new(&db);
    let crown = records.record(Constant::Sqrt2, RecordKind::Crown).unwrap();
    // the pre-mistake snapshot is what counts
    assert_eq!(crown.digit_count, 4);
    assert_eq!(crown.cumulative_times, vec![0.0, 0.5, 1.0, 1.5]);

    let history = db.load_history(Constant::Sqrt2).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].mode, SessionMode::Practice);
    assert_eq!(db.load_daily_streak().unwrap().current, 1);
}

#[test]
fn a_week_of_chunk_reviews() {
    let db = StatsDb::open_in_memory().unwrap();
    let config = LearningConfig {
        chunk_size: 10,
        daily_new_chunks: 1,
        daily_review_limit: 5,
    };
    let mut learning = LearningStore::with_defaults(&db, config);
    let day0 = morning();

    let granted = learning.new_chunks_to_learn(Constant::Phi, 3, day0);
    assert_eq!(granted.len(), 1);
    assert!(learning.new_chunks_to_learn(Constant::Phi, 1, day0).is_empty());

    let chunk = learning.save_review(Constant::Phi, 0, RecallRating::Good, day0);
    assert_eq!(chunk.interval, 2.0);
    assert!(learning.due_chunks(Constant::Phi, None, day0).is_empty());

    let day2 = day0 + Duration::days(2);
    let due = learning.due_chunks(Constant::Phi, None, day2);
    assert_eq!(due.len(), 1);

    let chunk = learning.save_review(Constant::Phi, 0, RecallRating::Easy, day2);
    assert_eq!(chunk.interval, 5.0);

    // a new day brings a fresh quota
    let next = learning.new_chunks_to_learn(Constant::Phi, 1, day2);
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].chunk_index, 1);
    assert_eq!(next[0].digit_range(10), 10..20);

    let mut reopened = LearningStore::new(&db);
    assert_ne!(reopened.progress(Constant::Phi, 0).state, ChunkState::New);
    assert_eq!(tracked_chunks(&mut reopened, day2), 2);
}

fn tracked_chunks(store: &mut LearningStore<&StatsDb>, now: DateTime<Local>) -> usize {
    store.state(Constant::Phi, now).tracked_chunks().count()
}

#[test]
fn manual_clock_is_shared_by_reference() {
    let clock = ManualClock::new(morning());
    let by_ref: &ManualClock = &clock;
    clock.advance_secs_f64(1.5);
    assert_eq!(by_ref.now(), morning() + Duration::milliseconds(1500));
}
