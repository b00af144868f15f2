use std::sync::Arc;

use crate::admin::AdminService;
use crate::cli::config::load_session_file;
use crate::cli::utils::output_error;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::datastore::{DataStore, RestDataStore};
use crate::documents::DocumentClient;
use crate::favorites::FavoritesStore;
use crate::permissions::AccessState;
use crate::portal::Portal;
use crate::routing::RouteGuard;
use crate::session::Session;
use crate::storage::{FileStorage, KeyValueStorage};
use crate::sync::SyncChannel;

/// Why a command cannot go on: a stable error code and a message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    pub code: &'static str,
    pub message: String,
}

impl Refusal {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn report(&self, output_format: &OutputFormat) -> anyhow::Result<()> {
        output_error(output_format, &self.message, Some(self.code))
    }
}

/// Services a CLI command works with, built from config and the saved session
pub struct CliContext {
    pub portal: Portal,
    pub admin: AdminService,
}

impl CliContext {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let session = Arc::new(Session::anonymous());

        // Environment token wins over the saved one
        let token = match config.session.access_token.clone() {
            Some(token) => Some(token),
            None => load_session_file()?.access_token,
        };
        if let Some(token) = token {
            if let Err(err) = session.sign_in_with_token(&token) {
                tracing::warn!(error = %err, "saved access token rejected; continuing signed out");
            }
        }

        let data_store: Arc<dyn DataStore> = Arc::new(RestDataStore::new(&config.store, Arc::clone(&session))?);
        let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::in_config_dir(&config.favorites.storage_file)?);

        Ok(Self::assemble(config, data_store, session, storage))
    }

    /// Wire the portal and admin services with the configured key prefix and routes
    pub fn assemble(
        config: &AppConfig,
        data_store: Arc<dyn DataStore>,
        session: Arc<Session>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let channel = SyncChannel::new();
        let favorites = Arc::new(FavoritesStore::with_key_prefix(
            storage,
            Arc::clone(&channel),
            config.favorites.storage_key_prefix.clone(),
        ));
        let portal = Portal::with_favorites(Arc::clone(&data_store), Arc::clone(&session), favorites, channel)
            .with_guard(RouteGuard::from_config(&config.session));

        Self {
            portal,
            admin: AdminService::new(data_store, session),
        }
    }

    /// Load access and refuse unless it resolved
    pub async fn require_ready(&self) -> Result<(), Refusal> {
        match self.portal.load().await {
            AccessState::Ready(_) => Ok(()),
            AccessState::Unauthenticated => Err(Refusal::new(
                "UNAUTHENTICATED",
                "Not logged in; run `konty auth login <email>`",
            )),
            AccessState::Failed { message, retryable } => {
                let hint = if retryable { " (try again)" } else { "" };
                Err(Refusal::new(
                    "PERMISSION_FETCH_FAILED",
                    format!("Could not load permissions: {}{}", message, hint),
                ))
            }
            AccessState::Loading => Err(Refusal::new("LOADING", "Permissions are still loading")),
        }
    }

    /// Load access and refuse unless `module_key` is granted
    pub async fn require_module(&self, module_key: &str) -> Result<(), Refusal> {
        self.require_ready().await?;
        if self.portal.can_access(module_key) {
            Ok(())
        } else {
            tracing::info!(module = module_key, "module not granted");
            Err(Refusal::new(
                "UNAUTHORIZED",
                format!("Você não tem permissão para acessar o módulo {}.", module_key),
            ))
        }
    }

    pub fn documents(config: &AppConfig) -> anyhow::Result<DocumentClient> {
        Ok(DocumentClient::new(&config.documents)?)
    }
}
