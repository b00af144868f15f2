use clap::Subcommand;
use serde_json::json;

use crate::cli::context::CliContext;
use crate::cli::utils::{output_error, output_modules, output_success};
use crate::cli::OutputFormat;
use crate::favorites::ToggleOutcome;

#[derive(Subcommand)]
pub enum FavoritesCommands {
    #[command(about = "List favorite modules")]
    List,

    #[command(about = "Add or remove a module from favorites")]
    Toggle {
        #[arg(help = "Module path, key or name (e.g. /modulos/separador-pdf)")]
        path: String,
    },
}

pub async fn handle(cmd: FavoritesCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::from_config(crate::config::config())?;

    if let Err(refusal) = ctx.require_ready().await {
        return refusal.report(&output_format);
    }

    match cmd {
        FavoritesCommands::List => {
            let view = ctx.portal.dashboard();
            let favorites = ctx.portal.favorites().favorites();
            output_modules(
                &output_format,
                "favorites_modules",
                &view.favorites,
                &favorites,
                "Nenhum módulo favoritado.",
            )
        }
        FavoritesCommands::Toggle { path } => {
            // Accept keys and name slugs as well as paths
            let path = ctx
                .portal
                .catalog()
                .and_then(|catalog| catalog.canonical_path(&path).map(str::to_string))
                .unwrap_or(path);

            match ctx.portal.toggle_favorite(&path) {
                Ok(ToggleOutcome::Added) => output_success(
                    &output_format,
                    &format!("Added {} to favorites", path),
                    Some(json!({ "path": path, "favorite": true })),
                ),
                Ok(ToggleOutcome::Removed) => output_success(
                    &output_format,
                    &format!("Removed {} from favorites", path),
                    Some(json!({ "path": path, "favorite": false })),
                ),
                Ok(ToggleOutcome::Queued) | Ok(ToggleOutcome::Ignored) => {
                    output_error(&output_format, &format!("Unknown module: {}", path), Some("NOT_FOUND"))
                }
                Err(err) => output_error(&output_format, &err.to_string(), Some(err.error_code())),
            }
        }
    }
}
