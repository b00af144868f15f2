// Password sign-in and account activation against the auth provider (GoTrue)

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::config::StoreConfig;
use crate::datastore::rest::error_message;
use crate::error::{PortalError, PortalResult};
use crate::permissions::IdentityId;
use crate::session::{Identity, UserMetadata};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: IdentityId,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

impl From<AuthUser> for Identity {
    fn from(user: AuthUser) -> Self {
        Identity {
            id: user.id,
            email: user.email,
            full_name: user.user_metadata.and_then(|m| m.full_name),
        }
    }
}

/// Tokens issued by a successful sign-in
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub identity: Identity,
}

/// Check a new password and its confirmation before anything is sent
pub fn validate_new_password(password: &str, confirmation: &str) -> PortalResult<()> {
    if password != confirmation {
        return Err(PortalError::invalid_input("As senhas não coincidem."));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortalError::invalid_input(format!(
            "A senha deve ter no mínimo {} caracteres.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Thin client over the provider's `auth/v1` endpoints.
///
/// Credentials are checked by the provider; nothing here stores or hashes them.
pub struct AuthClient {
    client: Client,
    base: Url,
    anon_key: String,
    timeout_secs: u64,
}

impl AuthClient {
    pub fn new(config: &StoreConfig) -> PortalResult<Self> {
        let mut base = Url::parse(&config.url)
            .map_err(|e| PortalError::Config(format!("invalid store url '{}': {}", config.url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base,
            anon_key: config.anon_key.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn endpoint(&self, path: &str) -> PortalResult<Url> {
        self.base
            .join(path)
            .map_err(|e| PortalError::Config(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn transport_error(&self, err: reqwest::Error) -> PortalError {
        if err.is_timeout() {
            PortalError::Timeout(self.timeout_secs)
        } else {
            PortalError::Http(err)
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> PortalResult<AuthSession> {
        let url = self.endpoint("auth/v1/token")?;
        let response = self
            .client
            .post(url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            tracing::info!(status = status.as_u16(), "sign-in rejected");
            return Err(PortalError::InvalidCredentials);
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(PortalError::backend(status.as_u16(), message));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| PortalError::data_store(format!("unexpected sign-in response: {}", e)))?;
        let identity = Identity::from(tokens.user);
        tracing::info!(identity = %identity.id, "signed in with password");

        Ok(AuthSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            identity,
        })
    }

    /// Set the password of the account behind `access_token` (invite activation)
    pub async fn set_password(&self, access_token: &str, password: &str, confirmation: &str) -> PortalResult<()> {
        validate_new_password(password, confirmation)?;

        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .client
            .put(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&json!({ "password": password }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PortalError::Unauthenticated);
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(PortalError::backend(status.as_u16(), message));
        }
        tracing::info!("account password set");
        Ok(())
    }
}
