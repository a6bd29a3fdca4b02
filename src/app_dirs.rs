use directories::ProjectDirs;
use std::path::PathBuf;

/// Where pitrain keeps its files.
pub struct AppDirs;

impl AppDirs {
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("pitrain");
            Some(state_dir.join("pitrain.db"))
        } else {
            ProjectDirs::from("", "", "pitrain")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("pitrain.db"))
        }
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", "pitrain")
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("pitrain_config.json"))
    }
}
