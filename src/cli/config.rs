use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::storage::file::config_dir;

/// Saved CLI session (`session.json` in the config directory)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFile {
    pub access_token: Option<String>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionFile {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token: Some(access_token),
            saved_at: Some(Utc::now()),
        }
    }
}

pub fn load_session_file() -> anyhow::Result<SessionFile> {
    let session_file = config_dir()?.join("session.json");

    if !session_file.exists() {
        return Ok(SessionFile::default());
    }

    let content = fs::read_to_string(session_file)?;
    let session: SessionFile = serde_json::from_str(&content)?;
    Ok(session)
}

pub fn save_session_file(session: &SessionFile) -> anyhow::Result<()> {
    let session_file = config_dir()?.join("session.json");

    let content = serde_json::to_string_pretty(session)?;
    fs::write(session_file, content)?;
    Ok(())
}

pub fn clear_session_file() -> anyhow::Result<()> {
    let session_file = config_dir()?.join("session.json");
    if session_file.exists() {
        fs::remove_file(session_file)?;
    }
    Ok(())
}
