use crate::constant::Constant;
use crate::persistence::ChunkPersistence;
use crate::scheduler::{schedule, RecallRating};
use chrono::{DateTime, Local};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// Interval (days) above which a chunk counts as mastered.
const MASTERED_AFTER_DAYS: f64 = 30.0;
const DEFAULT_EASE: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkState {
    New,
    Learning,
    Review,
    Mastered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkReview {
    pub date: DateTime<Local>,
    pub rating: RecallRating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkProgress {
    pub chunk_index: usize,
    pub state: ChunkState,
    pub next_review_date: Option<DateTime<Local>>,
    /// Days.
    pub interval: f64,
    /// Unused by the scheduler for now.
    pub ease: f64,
    pub history: Vec<ChunkReview>,
}

impl ChunkProgress {
    pub fn new(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            state: ChunkState::New,
            next_review_date: None,
            interval: 0.0,
            ease: DEFAULT_EASE,
            history: Vec::new(),
        }
    }

    /// Never-scheduled chunks are due immediately.
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        self.next_review_date.map_or(true, |due| due <= now)
    }

    /// Positions of this chunk's digits in the expansion.
    pub fn digit_range(&self, chunk_size: usize) -> Range<usize> {
        let start = self.chunk_index * chunk_size;
        start..start + chunk_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningConfig {
    pub chunk_size: usize,
    pub daily_new_chunks: usize,
    pub daily_review_limit: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            daily_new_chunks: 2,
            daily_review_limit: 10,
        }
    }
}

/// Per-constant learning configuration, daily quota, and chunk progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantLearningState {
    pub chunk_size: usize,
    pub daily_new_chunks: usize,
    pub daily_review_limit: usize,
    pub last_activity_date: Option<DateTime<Local>>,
    pub new_chunks_granted_today: usize,
    pub progress: BTreeMap<usize, ChunkProgress>,
}

impl Default for ConstantLearningState {
    fn default() -> Self {
        Self::with_config(LearningConfig::default())
    }
}

impl ConstantLearningState {
    pub fn with_config(config: LearningConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            daily_new_chunks: config.daily_new_chunks,
            daily_review_limit: config.daily_review_limit,
            last_activity_date: None,
            new_chunks_granted_today: 0,
            progress: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> LearningConfig {
        LearningConfig {
            chunk_size: self.chunk_size,
            daily_new_chunks: self.daily_new_chunks,
            daily_review_limit: self.daily_review_limit,
        }
    }

    /// Tracked chunks ordered by index.
    pub fn tracked_chunks(&self) -> impl Iterator<Item = &ChunkProgress> {
        self.progress.values()
    }

    pub fn mastered_count(&self) -> usize {
        self.count_in(&[ChunkState::Mastered])
    }

    pub fn in_learning_count(&self) -> usize {
        self.count_in(&[ChunkState::Learning, ChunkState::Review])
    }

    pub fn remaining_new_quota(&self) -> usize {
        self.daily_new_chunks
            .saturating_sub(self.new_chunks_granted_today)
    }

    fn count_in(&self, states: &[ChunkState]) -> usize {
        self.progress
            .values()
            .filter(|c| states.contains(&c.state))
            .count()
    }
}

/// Rolls the daily counters over when `now` is on a different calendar day
/// than the last recorded activity.
pub fn reconcile(mut state: ConstantLearningState, now: DateTime<Local>) -> ConstantLearningState {
    if let Some(last) = state.last_activity_date {
        if last.date_naive() != now.date_naive() {
            state.new_chunks_granted_today = 0;
            state.last_activity_date = Some(now);
        }
    }
    state
}

/// Next state for a chunk given its freshly scheduled interval.
fn state_for_interval(interval: f64) -> ChunkState {
    if interval > MASTERED_AFTER_DAYS {
        ChunkState::Mastered
    } else if interval > 1.0 {
        ChunkState::Review
    } else {
        ChunkState::Learning
    }
}

/// Spaced-repetition bookkeeping for every constant, cached in memory and
/// written through to a [`ChunkPersistence`] on every mutation.
#[derive(Debug)]
pub struct LearningStore<P> {
    persistence: P,
    defaults: LearningConfig,
    states: HashMap<Constant, ConstantLearningState>,
}

impl<P: ChunkPersistence> LearningStore<P> {
    pub fn new(persistence: P) -> Self {
        Self::with_defaults(persistence, LearningConfig::default())
    }

    /// `defaults` applies to constants that have no stored state yet.
    pub fn with_defaults(persistence: P, defaults: LearningConfig) -> Self {
        Self {
            persistence,
            defaults,
            states: HashMap::new(),
        }
    }

    /// Reconciled snapshot of a constant's state. Reading never persists.
    pub fn state(&mut self, constant: Constant, now: DateTime<Local>) -> ConstantLearningState {
        reconcile(self.entry(constant).clone(), now)
    }

    pub fn progress(&mut self, constant: Constant, chunk_index: usize) -> ChunkProgress {
        self.entry(constant)
            .progress
            .get(&chunk_index)
            .cloned()
            .unwrap_or_else(|| ChunkProgress::new(chunk_index))
    }

    /// Reviewable chunks due at `now`, most overdue first.
    pub fn due_chunks(
        &mut self,
        constant: Constant,
        limit: Option<usize>,
        now: DateTime<Local>,
    ) -> Vec<ChunkProgress> {
        let due = self
            .entry(constant)
            .tracked_chunks()
            .filter(|c| c.state != ChunkState::New && c.is_due(now))
            // None sorts before Some, so never-scheduled chunks come first
            .sorted_by_key(|c| c.next_review_date)
            .cloned();
        match limit {
            Some(limit) => due.take(limit).collect(),
            None => due.collect(),
        }
    }

    /// Due chunks capped by the constant's daily review limit.
    pub fn review_queue(&mut self, constant: Constant, now: DateTime<Local>) -> Vec<ChunkProgress> {
        let limit = self.entry(constant).daily_review_limit;
        self.due_chunks(constant, Some(limit), now)
    }

    /// Granted-but-unreviewed chunks, e.g. left over from an abandoned session.
    pub fn pending_new_chunks(&mut self, constant: Constant) -> Vec<ChunkProgress> {
        self.entry(constant)
            .tracked_chunks()
            .filter(|c| c.state == ChunkState::New)
            .cloned()
            .collect()
    }

    /// Grants up to `requested` brand-new chunks within today's quota.
    ///
    /// The grant is committed to storage before it is returned so that an
    /// abandoned session still counts against the quota.
    pub fn new_chunks_to_learn(
        &mut self,
        constant: Constant,
        requested: usize,
        now: DateTime<Local>,
    ) -> Vec<ChunkProgress> {
        let mut state = reconcile(self.entry(constant).clone(), now);
        state.last_activity_date = Some(now);

        let granted = requested.min(state.remaining_new_quota());
        let first = state
            .progress
            .keys()
            .next_back()
            .map_or(0, |max| max + 1);

        let chunks: Vec<ChunkProgress> = (first..first + granted).map(ChunkProgress::new).collect();
        for chunk in &chunks {
            state.progress.insert(chunk.chunk_index, chunk.clone());
        }
        state.new_chunks_granted_today += granted;

        if granted < requested {
            debug!(
                "{constant}: granted {granted} of {requested} new chunks ({} already today)",
                state.new_chunks_granted_today - granted
            );
        }
        self.commit(constant, state);
        chunks
    }

    /// Applies a review rating and returns the updated chunk.
    pub fn save_review(
        &mut self,
        constant: Constant,
        chunk_index: usize,
        rating: RecallRating,
        now: DateTime<Local>,
    ) -> ChunkProgress {
        let mut state = self.entry(constant).clone();
        let mut chunk = state
            .progress
            .remove(&chunk_index)
            .unwrap_or_else(|| ChunkProgress::new(chunk_index));

        let result = schedule(chunk.interval, rating, now);
        chunk.interval = result.interval;
        chunk.next_review_date = Some(result.next_review_date);
        chunk.history.push(ChunkReview { date: now, rating });

        let previous = chunk.state;
        chunk.state = state_for_interval(chunk.interval);
        if chunk.state != previous {
            info!(
                "{constant} chunk {chunk_index}: {previous:?} -> {:?} (interval {} days)",
                chunk.state, chunk.interval
            );
        }

        state.progress.insert(chunk_index, chunk.clone());
        self.commit(constant, state);
        chunk
    }

    /// Replaces chunk size and quotas, keeping progress.
    pub fn configure(&mut self, constant: Constant, config: LearningConfig) {
        let mut state = self.entry(constant).clone();
        state.chunk_size = config.chunk_size;
        state.daily_new_chunks = config.daily_new_chunks;
        state.daily_review_limit = config.daily_review_limit;
        self.commit(constant, state);
    }

    /// Forgets all progress for a constant.
    pub fn reset(&mut self, constant: Constant) {
        self.commit(constant, ConstantLearningState::with_config(self.defaults));
    }

    fn entry(&mut self, constant: Constant) -> &ConstantLearningState {
        if !self.states.contains_key(&constant) {
            let loaded = match self.persistence.load_learning(constant) {
                Ok(Some(state)) => state,
                Ok(None) => ConstantLearningState::with_config(self.defaults),
                Err(e) => {
                    warn!("failed to load learning state for {constant}: {e}");
                    ConstantLearningState::with_config(self.defaults)
                }
            };
            self.states.insert(constant, loaded);
        }
        &self.states[&constant]
    }

    fn commit(&mut self, constant: Constant, state: ConstantLearningState) {
        if let Err(e) = self.persistence.save_learning(constant, &state) {
            warn!("failed to persist learning state for {constant}: {e}");
        }
        self.states.insert(constant, state);
    }
}
