use crate::app_dirs::AppDirs;
use crate::constant::Constant;
use crate::engine::Segment;
use crate::learning::LearningConfig;
use crate::records::RecordKind;
use crate::session::SessionMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub constant: Constant,
    pub mode: SessionMode,
    /// Which record the game-mode ghost replays.
    pub ghost_kind: RecordKind,
    pub chunk_size: usize,
    pub daily_new_chunks: usize,
    pub daily_review_limit: usize,
    /// Directory with `<constant>_digits.txt` files overriding the bundled ones.
    pub digits_dir: Option<PathBuf>,
    /// Digits drilled on repeat in learn mode.
    pub segment_start: usize,
    pub segment_end: usize,
}

impl Default for Config {
    fn default() -> Self {
        let learning = LearningConfig::default();
        Self {
            constant: Constant::default(),
            mode: SessionMode::default(),
            ghost_kind: RecordKind::Crown,
            chunk_size: learning.chunk_size,
            daily_new_chunks: learning.daily_new_chunks,
            daily_review_limit: learning.daily_review_limit,
            digits_dir: None,
            segment_start: Segment::default().start,
            segment_end: Segment::default().end,
        }
    }
}

impl Config {
    pub fn learning_config(&self) -> LearningConfig {
        LearningConfig {
            chunk_size: self.chunk_size.max(1),
            daily_new_chunks: self.daily_new_chunks,
            daily_review_limit: self.daily_review_limit,
        }
    }

    /// The learn-mode segment, aligned to tens. An empty range falls back
    /// to the default segment.
    pub fn segment(&self) -> Segment {
        Segment::aligned(self.segment_start, self.segment_end).unwrap_or_else(|| {
            log::warn!(
                "segment {}..{} is empty once aligned, using the default",
                self.segment_start,
                self.segment_end
            );
            Segment::default()
        })
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable config {}: {e}", self.path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            constant: Constant::Phi,
            mode: SessionMode::Game,
            ghost_kind: RecordKind::Lightning,
            chunk_size: 10,
            daily_new_chunks: 4,
            daily_review_limit: 25,
            digits_dir: Some(PathBuf::from("/opt/digits")),
            segment_start: 100,
            segment_end: 200,
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn legacy_and_partial_files_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"constant":"e","mode":"strict"}"#).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.constant, Constant::E);
        assert_eq!(cfg.mode, SessionMode::Test);
        assert_eq!(cfg.chunk_size, 20);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn learning_config_never_has_zero_chunks() {
        let cfg = Config {
            chunk_size: 0,
            ..Config::default()
        };
        assert_eq!(cfg.learning_config().chunk_size, 1);
    }

    #[test]
    fn segment_is_aligned_to_tens() {
        assert_eq!(Config::default().segment(), Segment { start: 0, end: 50 });
        let cfg = Config {
            segment_start: 25,
            segment_end: 78,
            ..Config::default()
        };
        assert_eq!(cfg.segment(), Segment { start: 20, end: 70 });
    }

    #[test]
    fn empty_segment_falls_back_to_default() {
        let cfg = Config {
            segment_start: 40,
            segment_end: 45,
            ..Config::default()
        };
        assert_eq!(cfg.segment(), Segment::default());
    }
}
