// Document-processing backend client (PDF receipt splitting)

pub mod log;

pub use log::{LogAction, LogEntry, LogResult, OperationLog};

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

use crate::config::DocumentsConfig;
use crate::error::{PortalError, PortalResult};

const PDF_MIME: &str = "application/pdf";
const UPLOAD_FIELD: &str = "pdfFile";
const SPLIT_ENDPOINT: &str = "processar-pdf";

/// A file picked for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> PortalResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PortalError::invalid_input(format!("cannot read {}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "documento.pdf".to_string());
        let content_type = name.to_ascii_lowercase().ends_with(".pdf").then_some(PDF_MIME);
        Ok(Self::new(name, content_type, bytes))
    }

    /// Declared type wins; without one, fall back to the extension
    pub fn is_pdf(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => ct.eq_ignore_ascii_case(PDF_MIME),
            None => self.name.to_ascii_lowercase().ends_with(".pdf"),
        }
    }
}

/// Archive returned by the backend
#[derive(Debug, Clone)]
pub struct ProcessedArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Suggested filename from a `content-disposition` header.
///
/// Handles quoted and bare `filename=` values and strips any directory
/// components. Returns `None` when nothing usable is present.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let value = header.split(';').map(str::trim).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim().eq_ignore_ascii_case("filename").then(|| value.trim())
    })?;

    let unquoted = value
        .strip_prefix('"')
        .map(|v| v.strip_suffix('"').unwrap_or(v))
        .unwrap_or(value);

    let base = unquoted.rsplit(['/', '\\']).next().unwrap_or(unquoted).trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

/// Client for the PDF-splitting endpoint.
///
/// Each call records its progress in an operation log that the module page
/// renders; failures surface the server's own message when it sends one.
pub struct DocumentClient {
    client: Client,
    base: Url,
    upload_timeout_secs: u64,
    default_archive_name: String,
    max_upload_bytes: usize,
    log: Mutex<OperationLog>,
}

impl DocumentClient {
    pub fn new(config: &DocumentsConfig) -> PortalResult<Self> {
        let mut base = Url::parse(&config.api_url)
            .map_err(|e| PortalError::Config(format!("invalid document api url '{}': {}", config.api_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client: Client::builder().build()?,
            base,
            upload_timeout_secs: config.upload_timeout_secs,
            default_archive_name: config.default_archive_name.clone(),
            max_upload_bytes: config.max_upload_bytes,
            log: Mutex::new(OperationLog::new()),
        })
    }

    pub fn log(&self) -> Vec<LogEntry> {
        self.lock_log().entries().to_vec()
    }

    /// Validate a picked file, logging the selection like the upload form does
    pub fn select(&self, file: &UploadFile) -> PortalResult<()> {
        let mut log = self.lock_log();
        if !file.is_pdf() {
            log.record(&file.name, LogAction::FileSelection, LogResult::Error, "Formato de arquivo inválido.");
            return Err(PortalError::invalid_input("Por favor, selecione um arquivo PDF."));
        }
        if file.bytes.len() > self.max_upload_bytes {
            log.record(&file.name, LogAction::FileSelection, LogResult::Error, "Arquivo excede o tamanho máximo.");
            return Err(PortalError::invalid_input(format!(
                "Arquivo excede o limite de {} bytes.",
                self.max_upload_bytes
            )));
        }
        log.record(&file.name, LogAction::FileSelection, LogResult::Success, "Arquivo PDF selecionado.");
        Ok(())
    }

    /// Upload `file` for splitting and return the resulting archive
    pub async fn split_pdf(&self, file: &UploadFile) -> PortalResult<ProcessedArchive> {
        self.select(file)?;
        self.lock_log()
            .record(&file.name, LogAction::Upload, LogResult::Processing, "Iniciando upload do PDF.");

        match self.upload(file).await {
            Ok(archive) => {
                self.lock_log().record(
                    &file.name,
                    LogAction::ProcessAndDownload,
                    LogResult::Success,
                    format!("Arquivo ZIP '{}' baixado.", archive.filename),
                );
                tracing::info!(file = %file.name, archive = %archive.filename, bytes = archive.bytes.len(), "pdf processed");
                Ok(archive)
            }
            Err(err) => {
                self.lock_log()
                    .record(&file.name, LogAction::ProcessAndDownload, LogResult::Error, err.to_string());
                Err(err)
            }
        }
    }

    async fn upload(&self, file: &UploadFile) -> PortalResult<ProcessedArchive> {
        let url = self
            .base
            .join(SPLIT_ENDPOINT)
            .map_err(|e| PortalError::Config(e.to_string()))?;

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(PDF_MIME)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .timeout(Duration::from_secs(self.upload_timeout_secs))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .or_else(|| v.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("Erro do servidor: {}", status.as_u16()));
            return Err(PortalError::backend(status.as_u16(), message));
        }

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| self.default_archive_name.clone());

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;

        Ok(ProcessedArchive {
            filename,
            bytes: bytes.to_vec(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> PortalError {
        if err.is_timeout() {
            PortalError::Timeout(self.upload_timeout_secs)
        } else {
            PortalError::Http(err)
        }
    }

    fn lock_log(&self) -> MutexGuard<'_, OperationLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
