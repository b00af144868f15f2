use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::catalog::{slugify, Catalog, ModuleDescriptor};
use crate::config::StoreConfig;
use crate::datastore::{DataStore, Profile, Role};
use crate::error::{PortalError, PortalResult};
use crate::permissions::{Grant, IdentityId};
use crate::session::Session;

/// Catalog row as stored; older rows carry no explicit route
#[derive(Debug, Deserialize)]
struct ModuleRow {
    #[serde(alias = "chave")]
    key: String,
    #[serde(alias = "nome")]
    name: String,
    #[serde(default, alias = "rota")]
    path: Option<String>,
    #[serde(default, alias = "descricao")]
    description: Option<String>,
    #[serde(default, alias = "categoria")]
    category: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "icone")]
    icon: Option<String>,
    #[serde(default, alias = "cor")]
    color: Option<String>,
}

impl From<ModuleRow> for ModuleDescriptor {
    fn from(row: ModuleRow) -> Self {
        let path = row
            .path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| format!("/modulos/{}", slugify(&row.key)));
        ModuleDescriptor {
            key: row.key,
            name: row.name,
            path,
            description: row.description,
            category: row.category,
            status: row.status,
            icon: row.icon,
            color: row.color,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    #[serde(default = "user_role")]
    role: Role,
}

fn user_role() -> Role {
    Role::User
}

#[derive(Debug, Deserialize)]
struct InvitedUser {
    id: IdentityId,
}

/// `DataStore` over the BaaS REST interface (PostgREST tables + auth admin).
///
/// Requests carry the project key as `apikey` and the session's access token
/// as bearer, falling back to the project key when signed out.
pub struct RestDataStore {
    client: Client,
    base: Url,
    anon_key: String,
    catalog_table: String,
    grants_table: String,
    profiles_table: String,
    timeout_secs: u64,
    session: Arc<Session>,
}

impl RestDataStore {
    pub fn new(config: &StoreConfig, session: Arc<Session>) -> PortalResult<Self> {
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
            catalog_table: config.catalog_table.clone(),
            grants_table: config.grants_table.clone(),
            profiles_table: config.profiles_table.clone(),
            timeout_secs: config.request_timeout_secs,
            session,
        })
    }

    fn endpoint(&self, path: &str) -> PortalResult<Url> {
        self.base
            .join(path)
            .map_err(|e| PortalError::Config(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn table(&self, table: &str) -> PortalResult<Url> {
        self.endpoint(&format!("rest/v1/{}", table))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.session.access_token().unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> PortalResult<Response> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                PortalError::Timeout(self.timeout_secs)
            } else {
                PortalError::data_store(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        tracing::warn!(status = status.as_u16(), %message, "data store request failed");
        Err(match status {
            StatusCode::UNAUTHORIZED => PortalError::Unauthenticated,
            StatusCode::FORBIDDEN => PortalError::forbidden(message),
            _ => PortalError::data_store(format!("{}: {}", status.as_u16(), message)),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortalResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortalError::data_store(format!("unexpected response body: {}", e)))
    }
}

/// Pull a readable message out of an error body (`message`, `error_description` or `error`)
pub(crate) async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|field| v.get(*field).and_then(Value::as_str).map(str::to_string))
        })
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

#[async_trait]
impl DataStore for RestDataStore {
    async fn fetch_catalog(&self) -> PortalResult<Catalog> {
        let url = self.table(&self.catalog_table)?;
        let rows: Vec<ModuleRow> = self
            .get_json(self.client.get(url).query(&[("select", "*")]))
            .await?;
        tracing::debug!(modules = rows.len(), "catalog fetched");
        Catalog::new(rows.into_iter().map(ModuleDescriptor::from).collect())
    }

    async fn fetch_grants(&self, identity: &IdentityId) -> PortalResult<Vec<Grant>> {
        let url = self.table(&self.grants_table)?;
        let user_filter = format!("eq.{}", identity);
        let grants: Vec<Grant> = self
            .get_json(self.client.get(url).query(&[
                ("select", "user_id,modulo_nome,ativo"),
                ("user_id", user_filter.as_str()),
            ]))
            .await?;
        tracing::debug!(identity = %identity, grants = grants.len(), "grants fetched");
        Ok(grants)
    }

    async fn fetch_role(&self, identity: &IdentityId) -> PortalResult<Role> {
        let url = self.table(&self.profiles_table)?;
        let id_filter = format!("eq.{}", identity);
        let rows: Vec<RoleRow> = self
            .get_json(
                self.client
                    .get(url)
                    .query(&[("select", "role"), ("id", id_filter.as_str())]),
            )
            .await?;
        rows.into_iter()
            .next()
            .map(|row| row.role)
            .ok_or_else(|| PortalError::forbidden(format!("no profile for {}", identity)))
    }

    async fn set_grant(&self, identity: &IdentityId, module_key: &str, active: bool) -> PortalResult<()> {
        let url = self.table(&self.grants_table)?;
        let body = json!([{
            "user_id": identity,
            "modulo_nome": module_key,
            "ativo": active,
        }]);
        self.send(
            self.client
                .post(url)
                .query(&[("on_conflict", "user_id,modulo_nome")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&body),
        )
        .await?;
        tracing::info!(identity = %identity, module = module_key, active, "grant updated");
        Ok(())
    }

    async fn list_profiles(&self) -> PortalResult<Vec<Profile>> {
        let url = self.table(&self.profiles_table)?;
        self.get_json(
            self.client
                .get(url)
                .query(&[("select", "id,email,full_name,role"), ("order", "email.asc")]),
        )
        .await
    }

    async fn invite_user(&self, email: &str) -> PortalResult<IdentityId> {
        let url = self.endpoint("auth/v1/invite")?;
        let invited: InvitedUser = self
            .get_json(self.client.post(url).json(&json!({ "email": email })))
            .await?;
        tracing::info!(identity = %invited.id, "user invited");
        Ok(invited.id)
    }

    async fn delete_user(&self, identity: &IdentityId) -> PortalResult<()> {
        let url = self.endpoint(&format!("auth/v1/admin/users/{}", identity))?;
        self.send(self.client.delete(url)).await?;
        tracing::info!(identity = %identity, "user deleted");
        Ok(())
    }
}
