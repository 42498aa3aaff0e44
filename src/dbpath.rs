use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use labelvol::db::{DB_FILE, META_FILE};
use std::fs;
use std::path::{Path, PathBuf};

fn is_name_only(s: &str) -> bool {
    !s.contains('/') && !s.contains('\\')
}

pub fn default_db_base_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("org", "labelvol", "labelvol")
        .ok_or_else(|| anyhow!("Unable to determine platform data directory"))?;
    Ok(proj.data_dir().to_path_buf())
}

/// A bare name lives under the platform data directory; anything with a
/// separator is taken as a path.
pub fn resolve_db_dir(db: &str) -> Result<PathBuf> {
    if is_name_only(db) {
        Ok(default_db_base_dir()?.join(db))
    } else {
        Ok(PathBuf::from(db))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDirState {
    /// Directory exists but is empty, or it was created just now.
    Empty,
    /// Directory contains meta.toml + labelvol.redb.
    LooksValid,
}

/// Create the directory if needed. A non-empty directory must already hold
/// a label volume database.
pub fn ensure_db_dir_is_valid_or_empty(db_dir: &Path) -> Result<DbDirState> {
    if !db_dir.exists() {
        fs::create_dir_all(db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;
        return Ok(DbDirState::Empty);
    }
    if !db_dir.is_dir() {
        return Err(anyhow!("DB path {} is not a directory", db_dir.display()));
    }

    let mut entries = fs::read_dir(db_dir)
        .with_context(|| format!("Failed to read directory {}", db_dir.display()))?;
    if entries.next().is_none() {
        return Ok(DbDirState::Empty);
    }

    if db_dir.join(DB_FILE).is_file() && db_dir.join(META_FILE).is_file() {
        Ok(DbDirState::LooksValid)
    } else {
        Err(anyhow!(
            "{} does not look like a labelvol database (expected {} and {})",
            db_dir.display(),
            META_FILE,
            DB_FILE
        ))
    }
}
