use crate::constant::Constant;
use crate::persistence::RecordPersistence;
use chrono::{DateTime, Local};
use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shortest run that may hold a Lightning record.
pub const LIGHTNING_MIN_DIGITS: usize = 50;

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
pub enum RecordKind {
    /// Distance: the longest correct run.
    Crown,
    /// Speed: the fastest qualifying pace.
    Lightning,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Crown, RecordKind::Lightning];

    pub fn other(&self) -> RecordKind {
        match self {
            RecordKind::Crown => RecordKind::Lightning,
            RecordKind::Lightning => RecordKind::Crown,
        }
    }
}

/// A personal best run, replayable as a ghost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalBestRecord {
    pub constant: Constant,
    pub kind: RecordKind,
    pub digit_count: usize,
    /// Seconds.
    pub total_time: f64,
    /// Seconds from start at which each digit was entered; non-decreasing.
    pub cumulative_times: Vec<f64>,
    pub date: DateTime<Local>,
}

impl PersonalBestRecord {
    pub fn digits_per_minute(&self) -> f64 {
        if self.total_time <= 0.0 {
            return 0.0;
        }
        self.digit_count as f64 / (self.total_time / 60.0)
    }

    /// Same run filed under the other ledger.
    pub fn as_kind(&self, kind: RecordKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

/// Promotion rule for a candidate against the record currently in its slot.
pub fn should_promote(candidate: &PersonalBestRecord, current: Option<&PersonalBestRecord>) -> bool {
    match candidate.kind {
        RecordKind::Crown => match current {
            None => true,
            Some(current) => {
                candidate.digit_count > current.digit_count
                    || (candidate.digit_count == current.digit_count
                        && candidate.total_time < current.total_time)
            }
        },
        RecordKind::Lightning => {
            if candidate.digit_count < LIGHTNING_MIN_DIGITS {
                return false;
            }
            match current {
                None => true,
                Some(current) => candidate.digits_per_minute() > current.digits_per_minute(),
            }
        }
    }
}

/// Write-through cache over a [`RecordPersistence`] with the promotion rules
/// applied on every submission. Crown and Lightning slots are independent.
#[derive(Debug)]
pub struct PersonalBestStore<P> {
    persistence: P,
    cache: HashMap<(Constant, RecordKind), Option<PersonalBestRecord>>,
}

impl<P: RecordPersistence> PersonalBestStore<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            persistence,
            cache: HashMap::new(),
        }
    }

    pub fn record(&mut self, constant: Constant, kind: RecordKind) -> Option<&PersonalBestRecord> {
        if !self.cache.contains_key(&(constant, kind)) {
            match self.persistence.load_record(constant, kind) {
                Ok(loaded) => {
                    self.cache.insert((constant, kind), loaded);
                }
                Err(e) => {
                    warn!("failed to load {kind} record for {constant}: {e}");
                    return None;
                }
            }
        }
        self.cache.get(&(constant, kind)).and_then(Option::as_ref)
    }

    /// Stores the record if it beats the current one. Returns whether it did.
    pub fn submit(&mut self, record: PersonalBestRecord) -> bool {
        let (constant, kind) = (record.constant, record.kind);
        if !should_promote(&record, self.record(constant, kind)) {
            debug!(
                "{kind} candidate for {constant} ({} digits, {:.2}s) is not a record",
                record.digit_count, record.total_time
            );
            return false;
        }

        info!(
            "new {kind} record for {constant}: {} digits in {:.2}s",
            record.digit_count, record.total_time
        );
        if let Err(e) = self.persistence.save_record(&record) {
            warn!("failed to persist {kind} record for {constant}: {e}");
        }
        self.cache.insert((constant, kind), Some(record));
        true
    }

    /// Longest stored run for the constant across both ledgers.
    pub fn best_score(&mut self, constant: Constant) -> usize {
        RecordKind::ALL
            .into_iter()
            .filter_map(|kind| self.record(constant, kind).map(|r| r.digit_count))
            .max()
            .unwrap_or(0)
    }

    /// Record to race against: the preferred ledger, else the other one.
    pub fn ghost_for(
        &mut self,
        constant: Constant,
        preferred: RecordKind,
    ) -> Option<&PersonalBestRecord> {
        let kind = if self.record(constant, preferred).is_some() {
            preferred
        } else {
            preferred.other()
        };
        self.record(constant, kind)
    }

    /// Drops the in-memory cache; the next read goes back to storage.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }
}
