use clap::Subcommand;
use serde_json::json;
use std::io::{self, BufRead, Write};

use crate::auth::AuthClient;
use crate::cli::config::{clear_session_file, load_session_file, save_session_file, SessionFile};
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::session::identity_from_access_token;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Sign in with e-mail and password")]
    Login {
        #[arg(help = "E-mail address")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Save an access token issued by the portal's auth provider")]
    Token {
        #[arg(help = "Access token (JWT)")]
        token: String,
    },

    #[command(about = "Set the password of an invited account")]
    Activate {
        #[arg(long, help = "New password (will prompt if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Password confirmation (will prompt if not provided)")]
        confirm: Option<String>,
    },

    #[command(about = "Forget the saved access token")]
    Logout,

    #[command(about = "Show current user information")]
    Whoami,
}

/// Read one line from stdin after printing `label` on stderr
fn prompt(label: &str) -> anyhow::Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn saved_token() -> anyhow::Result<Option<String>> {
    Ok(crate::config::config()
        .session
        .access_token
        .clone()
        .or(load_session_file()?.access_token))
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Senha")?,
            };
            let client = AuthClient::new(&crate::config::config().store)?;
            let session = match client.sign_in_with_password(&email, &password).await {
                Ok(session) => session,
                Err(err) => return output_error(&output_format, &err.to_string(), Some(err.error_code())),
            };
            save_session_file(&SessionFile::new(session.access_token))?;
            output_success(
                &output_format,
                &format!("Logged in as {}", session.identity.display_name()),
                Some(json!({ "identity": session.identity })),
            )
        }
        AuthCommands::Token { token } => {
            let identity = match identity_from_access_token(&token) {
                Ok(identity) => identity,
                Err(err) => return output_error(&output_format, &err.to_string(), Some(err.error_code())),
            };
            save_session_file(&SessionFile::new(token))?;
            output_success(
                &output_format,
                &format!("Logged in as {}", identity.display_name()),
                Some(json!({ "identity": identity })),
            )
        }
        AuthCommands::Activate { password, confirm } => {
            let Some(token) = saved_token()? else {
                return output_error(
                    &output_format,
                    "No invitation session; open the invite link or run `konty auth token <token>` first",
                    Some("UNAUTHENTICATED"),
                );
            };
            let password = match password {
                Some(password) => password,
                None => prompt("Nova senha")?,
            };
            let confirm = match confirm {
                Some(confirm) => confirm,
                None => prompt("Confirmar senha")?,
            };
            let client = AuthClient::new(&crate::config::config().store)?;
            match client.set_password(&token, &password, &confirm).await {
                Ok(()) => output_success(&output_format, "Senha definida. Sua conta está ativa.", None),
                Err(err) => output_error(&output_format, &err.to_string(), Some(err.error_code())),
            }
        }
        AuthCommands::Logout => {
            clear_session_file()?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Whoami => {
            let Some(token) = saved_token()? else {
                return output_error(&output_format, "Not logged in", Some("UNAUTHENTICATED"));
            };
            match identity_from_access_token(&token) {
                Ok(identity) => match output_format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&json!({ "identity": identity }))?);
                        Ok(())
                    }
                    OutputFormat::Text => {
                        println!("{} ({})", identity.display_name(), identity.initials());
                        println!("ID: {}", identity.id);
                        if let Some(email) = identity.email.as_deref() {
                            println!("Email: {}", email);
                        }
                        Ok(())
                    }
                },
                Err(err) => output_error(&output_format, &err.to_string(), Some(err.error_code())),
            }
        }
    }
}
