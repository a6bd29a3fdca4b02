// Storage contracts the core talks to, plus an in-memory implementation.
// Every method takes `&self`; adapters use interior mutability so one store
// can back the engine and both caches at once.

use crate::constant::Constant;
use crate::history::{DailyStreak, MAX_HISTORY};
use crate::learning::ConstantLearningState;
use crate::records::{PersonalBestRecord, RecordKind};
use crate::session::SessionRecord;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("storage unavailable")]
    Unavailable,
}

/// Monotonic "furthest index reached" per constant key.
pub trait HighestIndexPersistence {
    /// Stores `index` only if it exceeds the stored value.
    fn record_highest_index(&self, index: usize, constant_key: &str) -> Result<(), StoreError>;
    /// 0 when nothing is stored.
    fn read_highest_index(&self, constant_key: &str) -> Result<usize, StoreError>;
}

pub trait RecordPersistence {
    fn load_record(
        &self,
        constant: Constant,
        kind: RecordKind,
    ) -> Result<Option<PersonalBestRecord>, StoreError>;
    /// Overwrites the slot for `(record.constant, record.kind)`.
    fn save_record(&self, record: &PersonalBestRecord) -> Result<(), StoreError>;
}

pub trait ChunkPersistence {
    fn load_learning(&self, constant: Constant) -> Result<Option<ConstantLearningState>, StoreError>;
    fn save_learning(&self, constant: Constant, state: &ConstantLearningState) -> Result<(), StoreError>;
}

pub trait HistoryPersistence {
    /// Prepends a session and trims the constant's history to [`MAX_HISTORY`].
    /// Also raises the constant's best streak.
    fn append_session(&self, record: &SessionRecord) -> Result<(), StoreError>;
    /// Newest first.
    fn load_history(&self, constant: Constant) -> Result<Vec<SessionRecord>, StoreError>;
    /// Drops the sessions but keeps the best streak.
    fn clear_history(&self, constant: Constant) -> Result<(), StoreError>;
    fn best_streak(&self, constant: Constant) -> Result<usize, StoreError>;
    fn load_daily_streak(&self) -> Result<DailyStreak, StoreError>;
    fn save_daily_streak(&self, streak: &DailyStreak) -> Result<(), StoreError>;
}

macro_rules! forward_persistence {
    ($($wrapper:ty),*) => {$(
        impl<T: HighestIndexPersistence + ?Sized> HighestIndexPersistence for $wrapper {
            fn record_highest_index(&self, index: usize, constant_key: &str) -> Result<(), StoreError> {
                (**self).record_highest_index(index, constant_key)
            }
            fn read_highest_index(&self, constant_key: &str) -> Result<usize, StoreError> {
                (**self).read_highest_index(constant_key)
            }
        }

        impl<T: RecordPersistence + ?Sized> RecordPersistence for $wrapper {
            fn load_record(
                &self,
                constant: Constant,
                kind: RecordKind,
            ) -> Result<Option<PersonalBestRecord>, StoreError> {
                (**self).load_record(constant, kind)
            }
            fn save_record(&self, record: &PersonalBestRecord) -> Result<(), StoreError> {
                (**self).save_record(record)
            }
        }

        impl<T: ChunkPersistence + ?Sized> ChunkPersistence for $wrapper {
            fn load_learning(&self, constant: Constant) -> Result<Option<ConstantLearningState>, StoreError> {
                (**self).load_learning(constant)
            }
            fn save_learning(&self, constant: Constant, state: &ConstantLearningState) -> Result<(), StoreError> {
                (**self).save_learning(constant, state)
            }
        }

        impl<T: HistoryPersistence + ?Sized> HistoryPersistence for $wrapper {
            fn append_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
                (**self).append_session(record)
            }
            fn load_history(&self, constant: Constant) -> Result<Vec<SessionRecord>, StoreError> {
                (**self).load_history(constant)
            }
            fn clear_history(&self, constant: Constant) -> Result<(), StoreError> {
                (**self).clear_history(constant)
            }
            fn best_streak(&self, constant: Constant) -> Result<usize, StoreError> {
                (**self).best_streak(constant)
            }
            fn load_daily_streak(&self) -> Result<DailyStreak, StoreError> {
                (**self).load_daily_streak()
            }
            fn save_daily_streak(&self, streak: &DailyStreak) -> Result<(), StoreError> {
                (**self).save_daily_streak(streak)
            }
        }
    )*};
}

forward_persistence!(&T, Rc<T>);

/// Volatile store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    highest: RefCell<HashMap<String, usize>>,
    records: RefCell<HashMap<(Constant, RecordKind), PersonalBestRecord>>,
    learning: RefCell<HashMap<Constant, ConstantLearningState>>,
    history: RefCell<HashMap<Constant, Vec<SessionRecord>>>,
    best_streaks: RefCell<HashMap<Constant, usize>>,
    daily: Cell<DailyStreak>,
    record_loads: Cell<usize>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    /// Makes every write fail with [`StoreError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// How many times a personal-best slot was read.
    pub fn record_loads(&self) -> usize {
        self.record_loads.get()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl HighestIndexPersistence for MemoryStore {
    fn record_highest_index(&self, index: usize, constant_key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut highest = self.highest.borrow_mut();
        let entry = highest.entry(constant_key.to_string()).or_insert(0);
        *entry = (*entry).max(index);
        Ok(())
    }

    fn read_highest_index(&self, constant_key: &str) -> Result<usize, StoreError> {
        Ok(self
            .highest
            .borrow()
            .get(constant_key)
            .copied()
            .unwrap_or(0))
    }
}

impl RecordPersistence for MemoryStore {
    fn load_record(
        &self,
        constant: Constant,
        kind: RecordKind,
    ) -> Result<Option<PersonalBestRecord>, StoreError> {
        self.record_loads.set(self.record_loads.get() + 1);
        Ok(self.records.borrow().get(&(constant, kind)).cloned())
    }

    fn save_record(&self, record: &PersonalBestRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.records
            .borrow_mut()
            .insert((record.constant, record.kind), record.clone());
        Ok(())
    }
}

impl ChunkPersistence for MemoryStore {
    fn load_learning(&self, constant: Constant) -> Result<Option<ConstantLearningState>, StoreError> {
        Ok(self.learning.borrow().get(&constant).cloned())
    }

    fn save_learning(&self, constant: Constant, state: &ConstantLearningState) -> Result<(), StoreError> {
        self.check_writable()?;
        self.learning.borrow_mut().insert(constant, state.clone());
        Ok(())
    }
}

impl HistoryPersistence for MemoryStore {
    fn append_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut history = self.history.borrow_mut();
        let sessions = history.entry(record.constant).or_default();
        sessions.insert(0, record.clone());
        sessions.truncate(MAX_HISTORY);

        let mut best = self.best_streaks.borrow_mut();
        let entry = best.entry(record.constant).or_insert(0);
        *entry = (*entry).max(record.best_streak);
        Ok(())
    }

    fn load_history(&self, constant: Constant) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .history
            .borrow()
            .get(&constant)
            .cloned()
            .unwrap_or_default())
    }

    fn clear_history(&self, constant: Constant) -> Result<(), StoreError> {
        self.check_writable()?;
        self.history.borrow_mut().remove(&constant);
        Ok(())
    }

    fn best_streak(&self, constant: Constant) -> Result<usize, StoreError> {
        Ok(self
            .best_streaks
            .borrow()
            .get(&constant)
            .copied()
            .unwrap_or(0))
    }

    fn load_daily_streak(&self) -> Result<DailyStreak, StoreError> {
        Ok(self.daily.get())
    }

    fn save_daily_streak(&self, streak: &DailyStreak) -> Result<(), StoreError> {
        self.check_writable()?;
        self.daily.set(*streak);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMode;
    use assert_matches::assert_matches;
    use chrono::{Local, TimeZone};

    #[test]
    fn highest_index_is_a_watermark() {
        let store = MemoryStore::default();
        assert_eq!(store.read_highest_index("pi").unwrap(), 0);
        store.record_highest_index(12, "pi").unwrap();
        store.record_highest_index(7, "pi").unwrap();
        assert_eq!(store.read_highest_index("pi").unwrap(), 12);
        assert_eq!(store.read_highest_index("e").unwrap(), 0);
    }

    #[test]
    fn failing_writes_report_unavailable() {
        let store = MemoryStore::default();
        store.fail_writes(true);
        assert_matches!(
            store.record_highest_index(3, "pi"),
            Err(StoreError::Unavailable)
        );
        assert_eq!(store.read_highest_index("pi").unwrap(), 0);
    }

    #[test]
    fn history_is_newest_first_and_capped() {
        let store = MemoryStore::default();
        let start = Local.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        for i in 0..(MAX_HISTORY + 5) {
            let record = SessionRecord {
                date: start + chrono::Duration::minutes(i as i64),
                constant: Constant::Pi,
                mode: SessionMode::Test,
                attempts: i + 1,
                errors: 1,
                best_streak: i,
                duration_secs: 10.0,
                digits_per_minute: 6.0 * i as f64,
                was_victory: None,
                segment: None,
                loops: 0,
            };
            store.append_session(&record).unwrap();
        }
        let history = store.load_history(Constant::Pi).unwrap();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].attempts, MAX_HISTORY + 5);
        assert_eq!(store.best_streak(Constant::Pi).unwrap(), MAX_HISTORY + 4);

        store.clear_history(Constant::Pi).unwrap();
        assert!(store.load_history(Constant::Pi).unwrap().is_empty());
        assert_eq!(store.best_streak(Constant::Pi).unwrap(), MAX_HISTORY + 4);
    }

    #[test]
    fn forwards_through_rc() {
        let store = Rc::new(MemoryStore::default());
        let shared: Rc<MemoryStore> = Rc::clone(&store);
        shared.record_highest_index(4, "phi").unwrap();
        assert_eq!(store.read_highest_index("phi").unwrap(), 4);
    }
}
