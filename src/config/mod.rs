use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub store: StoreConfig,
    pub documents: DocumentsConfig,
    pub favorites: FavoritesConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Backend-as-a-service endpoint holding catalog, grants and profiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout_secs: u64,
    pub catalog_table: String,
    pub grants_table: String,
    pub profiles_table: String,
}

/// Document-processing backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    pub api_url: String,
    pub upload_timeout_secs: u64,
    pub default_archive_name: String,
    pub max_upload_bytes: usize,
    /// Catalog key a user must be granted to run the splitter
    pub module_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritesConfig {
    pub storage_key_prefix: String,
    pub storage_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub access_token: Option<String>,
    pub login_path: String,
    pub home_path: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Store overrides
        if let Ok(v) = env::var("KONTY_STORE_URL") {
            self.store.url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("KONTY_STORE_KEY") {
            self.store.anon_key = v;
        }
        if let Ok(v) = env::var("KONTY_REQUEST_TIMEOUT_SECS") {
            self.store.request_timeout_secs = v.parse().unwrap_or(self.store.request_timeout_secs);
        }

        // Document backend overrides
        if let Ok(v) = env::var("KONTY_API_URL") {
            self.documents.api_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("KONTY_UPLOAD_TIMEOUT_SECS") {
            self.documents.upload_timeout_secs = v.parse().unwrap_or(self.documents.upload_timeout_secs);
        }
        if let Ok(v) = env::var("KONTY_MAX_UPLOAD_BYTES") {
            self.documents.max_upload_bytes = v.parse().unwrap_or(self.documents.max_upload_bytes);
        }
        if let Ok(v) = env::var("KONTY_PDF_MODULE") {
            if !v.trim().is_empty() {
                self.documents.module_key = v.trim().to_string();
            }
        }

        // Favorites overrides
        if let Ok(v) = env::var("KONTY_STORAGE_FILE") {
            self.favorites.storage_file = v;
        }
        if let Ok(v) = env::var("KONTY_FAVORITES_PREFIX") {
            if !v.trim().is_empty() {
                self.favorites.storage_key_prefix = v.trim().to_string();
            }
        }

        // Session overrides
        if let Ok(v) = env::var("KONTY_ACCESS_TOKEN") {
            if !v.trim().is_empty() {
                self.session.access_token = Some(v.trim().to_string());
            }
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            store: StoreConfig {
                url: "http://127.0.0.1:54321".to_string(),
                anon_key: String::new(),
                request_timeout_secs: 30,
                catalog_table: "modulos".to_string(),
                grants_table: "permissoes".to_string(),
                profiles_table: "profiles".to_string(),
            },
            documents: DocumentsConfig {
                api_url: "http://127.0.0.1:5000".to_string(),
                upload_timeout_secs: 120,
                default_archive_name: "recibos_processados.zip".to_string(),
                max_upload_bytes: 50 * 1024 * 1024, // 50MB
                module_key: "extrair-pdf".to_string(),
            },
            favorites: Self::default_favorites(),
            session: Self::default_session(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            store: StoreConfig {
                url: "https://staging.supabase.konty.example".to_string(),
                anon_key: String::new(),
                request_timeout_secs: 15,
                catalog_table: "modulos".to_string(),
                grants_table: "permissoes".to_string(),
                profiles_table: "profiles".to_string(),
            },
            documents: DocumentsConfig {
                api_url: "https://staging-api.konty.example".to_string(),
                upload_timeout_secs: 90,
                default_archive_name: "recibos_processados.zip".to_string(),
                max_upload_bytes: 25 * 1024 * 1024, // 25MB
                module_key: "extrair-pdf".to_string(),
            },
            favorites: Self::default_favorites(),
            session: Self::default_session(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            store: StoreConfig {
                url: "https://supabase.konty.example".to_string(),
                anon_key: String::new(),
                request_timeout_secs: 10,
                catalog_table: "modulos".to_string(),
                grants_table: "permissoes".to_string(),
                profiles_table: "profiles".to_string(),
            },
            documents: DocumentsConfig {
                api_url: "https://api.konty.example".to_string(),
                upload_timeout_secs: 60,
                default_archive_name: "recibos_processados.zip".to_string(),
                max_upload_bytes: 25 * 1024 * 1024, // 25MB
                module_key: "extrair-pdf".to_string(),
            },
            favorites: Self::default_favorites(),
            session: Self::default_session(),
        }
    }

    fn default_favorites() -> FavoritesConfig {
        FavoritesConfig {
            storage_key_prefix: "moduleFavorites".to_string(),
            storage_file: "storage.json".to_string(),
        }
    }

    fn default_session() -> SessionConfig {
        SessionConfig {
            access_token: None,
            login_path: "/login".to_string(),
            home_path: "/dashboard".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
