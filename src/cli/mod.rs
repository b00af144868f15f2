pub mod commands;
pub mod config;
pub mod context;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "konty")]
#[command(about = "Konty CLI - modules, favorites and document tools of the Konty Sistemas portal")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Session management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "List the modules available to the signed-in user")]
    Modules {
        #[arg(long, help = "Only modules whose name, key or description matches")]
        search: Option<String>,
    },

    #[command(about = "Favorite modules")]
    Favorites {
        #[command(subcommand)]
        cmd: commands::favorites::FavoritesCommands,
    },

    #[command(about = "PDF processing")]
    Pdf {
        #[command(subcommand)]
        cmd: commands::pdf::PdfCommands,
    },

    #[command(about = "User and permission administration")]
    Admin {
        #[command(subcommand)]
        cmd: commands::admin::AdminCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Modules { search } => commands::modules::handle(search, output_format).await,
        Commands::Favorites { cmd } => commands::favorites::handle(cmd, output_format).await,
        Commands::Pdf { cmd } => commands::pdf::handle(cmd, output_format).await,
        Commands::Admin { cmd } => commands::admin::handle(cmd, output_format).await,
    }
}
