use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

use crate::error::{PortalError, PortalResult};
use crate::permissions::IdentityId;

/// The signed-in user as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<IdentityId>) -> Self {
        Self {
            id: id.into(),
            email: None,
            full_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Full name, then email, then a generic label
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Usuário")
    }

    /// Two upper-case letters from the email handle, "U" without an email
    pub fn initials(&self) -> String {
        let Some(email) = self.email.as_deref() else {
            return "U".to_string();
        };
        let handle = email.split('@').next().filter(|h| !h.is_empty()).unwrap_or("user");
        handle.chars().take(2).collect::<String>().to_uppercase()
    }
}

/// Claims carried by the provider's access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Read the identity out of a bearer access token.
///
/// The signature is not checked here; the data store verifies it on every
/// request. Expiry is enforced so a stale token reads as signed out.
pub fn identity_from_access_token(token: &str) -> PortalResult<Identity> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.validate_exp = true;

    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| PortalError::Token(e.to_string()))?;

    let claims = data.claims;
    if claims.sub.trim().is_empty() {
        return Err(PortalError::Token("token has no subject".to_string()));
    }

    Ok(Identity {
        id: IdentityId::new(claims.sub),
        email: claims.email,
        full_name: claims.user_metadata.and_then(|m| m.full_name),
    })
}

/// Snapshot of who was signed in when an async operation started.
///
/// Results are applied only while `Session::is_current` still holds for the
/// token; anything arriving after a sign-out or identity switch is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToken {
    generation: u64,
    identity: Option<IdentityId>,
}

impl IdentityToken {
    pub fn identity(&self) -> Option<&IdentityId> {
        self.identity.as_ref()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    identity: Option<Identity>,
    access_token: Option<String>,
    generation: u64,
}

/// Current identity plus a generation counter bumped on every change
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        let session = Self::default();
        session.sign_in(identity, None);
        session
    }

    pub fn sign_in(&self, identity: Identity, access_token: Option<String>) -> IdentityToken {
        let mut state = self.lock();
        state.generation += 1;
        tracing::info!(identity = %identity.id, "signed in");
        state.identity = Some(identity);
        state.access_token = access_token;
        Self::token_of(&state)
    }

    pub fn sign_in_with_token(&self, access_token: &str) -> PortalResult<IdentityToken> {
        let identity = identity_from_access_token(access_token)?;
        Ok(self.sign_in(identity, Some(access_token.to_string())))
    }

    pub fn sign_out(&self) {
        let mut state = self.lock();
        if let Some(identity) = state.identity.take() {
            tracing::info!(identity = %identity.id, "signed out");
        }
        state.access_token = None;
        state.generation += 1;
    }

    pub fn current(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    pub fn identity_id(&self) -> Option<IdentityId> {
        self.lock().identity.as_ref().map(|i| i.id.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().identity.is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    /// Token to carry across an await
    pub fn begin(&self) -> IdentityToken {
        Self::token_of(&self.lock())
    }

    pub fn is_current(&self, token: &IdentityToken) -> bool {
        let state = self.lock();
        state.generation == token.generation
            && state.identity.as_ref().map(|i| &i.id) == token.identity.as_ref()
    }

    fn token_of(state: &SessionState) -> IdentityToken {
        IdentityToken {
            generation: state.generation,
            identity: state.identity.as_ref().map(|i| i.id.clone()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
