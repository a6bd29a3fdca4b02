use crate::app_dirs::AppDirs;
use crate::constant::Constant;
use crate::history::{DailyStreak, MAX_HISTORY};
use crate::learning::ConstantLearningState;
use crate::persistence::{
    ChunkPersistence, HighestIndexPersistence, HistoryPersistence, RecordPersistence, StoreError,
};
use crate::records::{PersonalBestRecord, RecordKind};
use crate::engine::Segment;
use crate::session::{SessionMode, SessionRecord};
use chrono::{DateTime, Local};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS watermarks (
        constant TEXT PRIMARY KEY,
        highest_index INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS records (
        constant TEXT NOT NULL,
        kind TEXT NOT NULL,
        digit_count INTEGER NOT NULL,
        total_time REAL NOT NULL,
        cumulative_times TEXT NOT NULL,
        date TEXT NOT NULL,
        PRIMARY KEY (constant, kind)
    );
    CREATE TABLE IF NOT EXISTS learning (
        constant TEXT PRIMARY KEY,
        state TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        constant TEXT NOT NULL,
        mode TEXT NOT NULL,
        date TEXT NOT NULL,
        attempts INTEGER NOT NULL,
        errors INTEGER NOT NULL,
        best_streak INTEGER NOT NULL,
        duration_secs REAL NOT NULL,
        digits_per_minute REAL NOT NULL,
        was_victory BOOLEAN,
        segment_start INTEGER,
        segment_end INTEGER,
        loops INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_constant ON sessions(constant);
    CREATE TABLE IF NOT EXISTS best_streaks (
        constant TEXT PRIMARY KEY,
        best_streak INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS daily_streak (
        id INTEGER PRIMARY KEY CHECK (id = 0),
        state TEXT NOT NULL
    );
"#;

/// SQLite-backed store for every piece of trainer state.
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Opens the database at its default location, creating it if needed.
    pub fn new() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("pitrain.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("opening stats database at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        add_segment_columns(&conn)?;
        Ok(StatsDb { conn })
    }

    /// Wipes personal bests, chunk progress and history for one constant.
    pub fn clear_constant(&self, constant: Constant) -> Result<(), StoreError> {
        let key = constant.key();
        for table in ["watermarks", "records", "learning", "sessions", "best_streaks"] {
            self.conn
                .execute(&format!("DELETE FROM {table} WHERE constant = ?1"), [key])?;
        }
        info!("cleared stored progress for {key}");
        Ok(())
    }
}

// Session tables created before segment practice lack the last three columns.
fn add_segment_columns(conn: &Connection) -> Result<(), StoreError> {
    let has_loops = conn
        .prepare("SELECT 1 FROM pragma_table_info('sessions') WHERE name = 'loops'")?
        .exists([])?;
    if !has_loops {
        debug!("adding segment columns to sessions");
        conn.execute_batch(
            r#"
            ALTER TABLE sessions ADD COLUMN segment_start INTEGER;
            ALTER TABLE sessions ADD COLUMN segment_end INTEGER;
            ALTER TABLE sessions ADD COLUMN loops INTEGER NOT NULL DEFAULT 0;
            "#,
        )?;
    }
    Ok(())
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Local))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

impl HighestIndexPersistence for StatsDb {
    fn record_highest_index(&self, index: usize, constant_key: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO watermarks (constant, highest_index) VALUES (?1, ?2)
            ON CONFLICT(constant) DO UPDATE
            SET highest_index = MAX(highest_index, excluded.highest_index)
            "#,
            params![constant_key, index as i64],
        )?;
        Ok(())
    }

    fn read_highest_index(&self, constant_key: &str) -> Result<usize, StoreError> {
        let index: Option<i64> = self
            .conn
            .query_row(
                "SELECT highest_index FROM watermarks WHERE constant = ?1",
                [constant_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(index.unwrap_or(0).max(0) as usize)
    }
}

impl RecordPersistence for StatsDb {
    fn load_record(
        &self,
        constant: Constant,
        kind: RecordKind,
    ) -> Result<Option<PersonalBestRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT digit_count, total_time, cumulative_times, date
                FROM records WHERE constant = ?1 AND kind = ?2
                "#,
                params![constant.key(), kind.to_string()],
                |row| {
                    let times: String = row.get(2)?;
                    let date: String = row.get(3)?;
                    Ok(PersonalBestRecord {
                        constant,
                        kind,
                        digit_count: row.get::<_, i64>(0)? as usize,
                        total_time: row.get(1)?,
                        cumulative_times: parse_json(2, &times)?,
                        date: parse_date(3, &date)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn save_record(&self, record: &PersonalBestRecord) -> Result<(), StoreError> {
        let times = serde_json::to_string(&record.cumulative_times)?;
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO records
            (constant, kind, digit_count, total_time, cumulative_times, date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.constant.key(),
                record.kind.to_string(),
                record.digit_count as i64,
                record.total_time,
                times,
                record.date.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl ChunkPersistence for StatsDb {
    fn load_learning(&self, constant: Constant) -> Result<Option<ConstantLearningState>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM learning WHERE constant = ?1",
                [constant.key()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_learning(&self, constant: Constant, state: &ConstantLearningState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(state)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO learning (constant, state) VALUES (?1, ?2)",
            params![constant.key(), raw],
        )?;
        Ok(())
    }
}

impl HistoryPersistence for StatsDb {
    fn append_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let key = record.constant.key();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO sessions
            (constant, mode, date, attempts, errors, best_streak, duration_secs, digits_per_minute,
             was_victory, segment_start, segment_end, loops)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                key,
                record.mode.to_string(),
                record.date.to_rfc3339(),
                record.attempts as i64,
                record.errors as i64,
                record.best_streak as i64,
                record.duration_secs,
                record.digits_per_minute,
                record.was_victory,
                record.segment.map(|s| s.start as i64),
                record.segment.map(|s| s.end as i64),
                record.loops as i64,
            ],
        )?;
        tx.execute(
            r#"
            DELETE FROM sessions WHERE constant = ?1 AND id NOT IN (
                SELECT id FROM sessions WHERE constant = ?1 ORDER BY id DESC LIMIT ?2
            )
            "#,
            params![key, MAX_HISTORY as i64],
        )?;
        tx.execute(
            r#"
            INSERT INTO best_streaks (constant, best_streak) VALUES (?1, ?2)
            ON CONFLICT(constant) DO UPDATE
            SET best_streak = MAX(best_streak, excluded.best_streak)
            "#,
            params![key, record.best_streak as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_history(&self, constant: Constant) -> Result<Vec<SessionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT mode, date, attempts, errors, best_streak, duration_secs, digits_per_minute,
                   was_victory, segment_start, segment_end, loops
            FROM sessions WHERE constant = ?1
            ORDER BY id DESC
            "#,
        )?;

        let rows = stmt.query_map([constant.key()], |row| {
            let mode: String = row.get(0)?;
            let date: String = row.get(1)?;
            let start: Option<i64> = row.get(8)?;
            let end: Option<i64> = row.get(9)?;
            Ok(SessionRecord {
                date: parse_date(1, &date)?,
                constant,
                mode: serde_json::from_value::<SessionMode>(serde_json::Value::String(mode))
                    .unwrap_or_default(),
                attempts: row.get::<_, i64>(2)? as usize,
                errors: row.get::<_, i64>(3)? as usize,
                best_streak: row.get::<_, i64>(4)? as usize,
                duration_secs: row.get(5)?,
                digits_per_minute: row.get(6)?,
                was_victory: row.get(7)?,
                segment: start.zip(end).map(|(start, end)| Segment {
                    start: start as usize,
                    end: end as usize,
                }),
                loops: row.get::<_, i64>(10)? as usize,
            })
        })?;

        let mut sessions = Vec::new();
        for session in rows {
            sessions.push(session?);
        }
        Ok(sessions)
    }

    fn clear_history(&self, constant: Constant) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM sessions WHERE constant = ?1", [constant.key()])?;
        Ok(())
    }

    fn best_streak(&self, constant: Constant) -> Result<usize, StoreError> {
        let best: Option<i64> = self
            .conn
            .query_row(
                "SELECT best_streak FROM best_streaks WHERE constant = ?1",
                [constant.key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(best.unwrap_or(0).max(0) as usize)
    }

    fn load_daily_streak(&self) -> Result<DailyStreak, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT state FROM daily_streak WHERE id = 0", [], |row| {
                row.get(0)
            })
            .optional()?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(DailyStreak::default()),
        }
    }

    fn save_daily_streak(&self, streak: &DailyStreak) -> Result<(), StoreError> {
        let raw = serde_json::to_string(streak)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO daily_streak (id, state) VALUES (0, ?1)",
            [raw],
        )?;
        Ok(())
    }
}
