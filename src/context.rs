//! Remembered application state: the last signing key file and the license
//! database that was last in use. Stored as `context.json` in the config dir.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::files::{clean_temp_files, write_text_file};

pub const APP_NAME: &str = "rhlm";
const STATE_FILE: &str = "context.json";
const DEFAULT_DB_FILE: &str = "licenses.db";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ContextState {
    #[serde(default)]
    last_key: Option<PathBuf>,
    #[serde(default)]
    license_db: Option<PathBuf>,
}

#[derive(Debug)]
pub struct AppContext {
    dir: PathBuf,
    state: ContextState,
}

impl AppContext {
    /// Platform config directory for this application, e.g. `~/.config/rhlm`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_NAME))
    }

    /// Loads the context stored in `dir`, creating the directory if needed.
    /// An unreadable or corrupt state file yields an empty context.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        clean_temp_files(&dir);

        let state_file = dir.join(STATE_FILE);
        let state = match std::fs::read_to_string(&state_file) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %state_file.display(), error = %e, "Ignoring corrupt context file");
                ContextState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ContextState::default(),
            Err(e) => {
                tracing::warn!(path = %state_file.display(), error = %e, "Ignoring unreadable context file");
                ContextState::default()
            }
        };
        Ok(Self { dir, state })
    }

    pub fn last_key(&self) -> Option<&Path> {
        self.state.last_key.as_deref()
    }

    pub fn license_db(&self) -> Option<&Path> {
        self.state.license_db.as_deref()
    }

    /// The remembered database, or `licenses.db` in the config dir.
    pub fn license_db_or_default(&self) -> PathBuf {
        self.state
            .license_db
            .clone()
            .unwrap_or_else(|| self.dir.join(DEFAULT_DB_FILE))
    }

    pub fn set_last_key(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.state.last_key = Some(path.into());
        self.save()
    }

    pub fn set_license_db(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.state.license_db = Some(path.into());
        self.save()
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state).unwrap_or_else(|_| "{}".to_string());
        write_text_file(&self.dir.join(STATE_FILE), &json)?;
        Ok(())
    }
}
