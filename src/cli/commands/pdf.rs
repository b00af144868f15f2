use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::context::CliContext;
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::documents::UploadFile;

#[derive(Subcommand)]
pub enum PdfCommands {
    #[command(about = "Split a payroll PDF into one file per receipt")]
    Split {
        #[arg(help = "PDF file to upload")]
        file: PathBuf,

        #[arg(long, help = "Directory to write the ZIP archive into (default: current directory)")]
        out: Option<PathBuf>,
    },
}

pub async fn handle(cmd: PdfCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PdfCommands::Split { file, out } => {
            let config = crate::config::config();
            let ctx = CliContext::from_config(config)?;
            if let Err(refusal) = ctx.require_module(&config.documents.module_key).await {
                return refusal.report(&output_format);
            }

            let client = CliContext::documents(config)?;
            let upload = UploadFile::from_path(&file).await?;

            let result = client.split_pdf(&upload).await;

            if let OutputFormat::Text = output_format {
                for entry in client.log().iter().rev() {
                    println!("{}", entry);
                }
            }

            match result {
                Ok(archive) => {
                    let target = out.unwrap_or_else(|| PathBuf::from(".")).join(&archive.filename);
                    tokio::fs::write(&target, &archive.bytes).await?;
                    output_success(
                        &output_format,
                        &format!("Saved {}", target.display()),
                        Some(json!({
                            "archive": target.display().to_string(),
                            "bytes": archive.bytes.len(),
                            "log": client.log(),
                        })),
                    )
                }
                Err(err) => output_error(&output_format, &err.to_string(), Some(err.error_code())),
            }
        }
    }
}
