use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogResult {
    Success,
    Error,
    Processing,
}

impl fmt::Display for LogResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogResult::Success => "Sucesso",
            LogResult::Error => "Erro",
            LogResult::Processing => "Processando",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogAction {
    FileSelection,
    FileRemoval,
    Upload,
    ProcessAndDownload,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogAction::FileSelection => "Seleção de Arquivo",
            LogAction::FileRemoval => "Remoção de Arquivo",
            LogAction::Upload => "Envio para Backend",
            LogAction::ProcessAndDownload => "Processamento e Download",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub file: String,
    pub action: LogAction,
    pub result: LogResult,
    pub details: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {} | {}",
            self.at.format("%d/%m/%Y %H:%M:%S"),
            self.file,
            self.action,
            self.result,
            self.details
        )
    }
}

/// Visible operation log, newest entry first
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    entries: Vec<LogEntry>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file: &str, action: LogAction, result: LogResult, details: impl Into<String>) {
        let entry = LogEntry {
            at: Utc::now(),
            file: if file.is_empty() { "N/A".to_string() } else { file.to_string() },
            action,
            result,
            details: details.into(),
        };
        match result {
            LogResult::Error => tracing::warn!(file = %entry.file, action = %action, details = %entry.details, "document operation failed"),
            _ => tracing::debug!(file = %entry.file, action = %action, result = %result, "document operation"),
        }
        self.entries.insert(0, entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.first()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
