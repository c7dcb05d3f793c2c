//! Centralized path utilities

use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = ".nixito";

/// Get the nixito config directory (~/.nixito)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Default SQLite database path (~/.nixito/nixito.db)
pub fn default_db_path() -> PathBuf {
    config_dir().join("nixito.db")
}
