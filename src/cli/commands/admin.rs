use clap::Subcommand;
use serde_json::json;

use crate::cli::context::CliContext;
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::datastore::Role;
use crate::error::PortalError;
use crate::permissions::IdentityId;

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "List registered users")]
    Users,

    #[command(about = "Show a user's module permissions")]
    Permissions {
        #[arg(help = "User ID")]
        user: String,
    },

    #[command(about = "Grant a module to a user")]
    Grant {
        #[arg(help = "User ID")]
        user: String,
        #[arg(help = "Module key")]
        module: String,
    },

    #[command(about = "Revoke a module from a user")]
    Revoke {
        #[arg(help = "User ID")]
        user: String,
        #[arg(help = "Module key")]
        module: String,
    },

    #[command(about = "Invite a new user by email")]
    Invite {
        #[arg(help = "Email address")]
        email: String,
    },

    #[command(about = "Delete a user account")]
    Delete {
        #[arg(help = "User ID")]
        user: String,
    },
}

pub async fn handle(cmd: AdminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::from_config(crate::config::config())?;
    let admin = &ctx.admin;

    let result = match cmd {
        AdminCommands::Users => match admin.list_users().await {
            Ok(users) => {
                match output_format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&json!({ "users": users }))?);
                    }
                    OutputFormat::Text => {
                        for user in &users {
                            let role = if user.role == Role::Admin { "admin" } else { "user" };
                            println!(
                                "{}  {:<32} {:<24} {}",
                                user.id,
                                user.email.as_deref().unwrap_or("-"),
                                user.full_name.as_deref().unwrap_or("-"),
                                role
                            );
                        }
                    }
                }
                Ok(())
            }
            Err(err) => Err(err),
        },
        AdminCommands::Permissions { user } => match admin.user_permissions(&IdentityId::from(user.as_str())).await {
            Ok(permissions) => {
                match output_format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&json!({ "permissions": permissions }))?);
                    }
                    OutputFormat::Text => {
                        for permission in &permissions {
                            let mark = if permission.active { "[x]" } else { "[ ]" };
                            println!("{} {:<20} {}", mark, permission.module.key, permission.module.name);
                        }
                    }
                }
                Ok(())
            }
            Err(err) => Err(err),
        },
        AdminCommands::Grant { user, module } => admin
            .grant(&IdentityId::from(user.as_str()), &module)
            .await
            .map(|_| report(&output_format, &format!("Granted {} to {}", module, user))),
        AdminCommands::Revoke { user, module } => admin
            .revoke(&IdentityId::from(user.as_str()), &module)
            .await
            .map(|_| report(&output_format, &format!("Revoked {} from {}", module, user))),
        AdminCommands::Invite { email } => admin.invite(&email).await.map(|id| {
            report_with(&output_format, &format!("Invitation sent to {}", email), Some(json!({ "id": id })))
        }),
        AdminCommands::Delete { user } => admin
            .delete_user(&IdentityId::from(user.as_str()))
            .await
            .map(|_| report(&output_format, &format!("Deleted user {}", user))),
    };

    match result {
        Ok(()) => Ok(()),
        Err(err @ PortalError::Forbidden(_)) => {
            output_error(&output_format, &format!("Acesso negado: {}", err), Some(err.error_code()))
        }
        Err(err) => output_error(&output_format, &err.to_string(), Some(err.error_code())),
    }
}

fn report(output_format: &OutputFormat, message: &str) {
    report_with(output_format, message, None)
}

fn report_with(output_format: &OutputFormat, message: &str, data: Option<serde_json::Value>) {
    if let Err(err) = output_success(output_format, message, data) {
        tracing::warn!(error = %err, "failed to write output");
    }
}
