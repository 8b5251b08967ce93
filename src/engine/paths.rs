// Souschef Engine — data paths

use std::path::PathBuf;

/// Directory holding all engine data, created on demand.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("souschef")
}

/// Path to the engine's SQLite database.
pub fn engine_db_path() -> PathBuf {
    data_dir().join("engine.db")
}
