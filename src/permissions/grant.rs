use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a signed-in identity as issued by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<uuid::Uuid> for IdentityId {
    fn from(value: uuid::Uuid) -> Self {
        Self(value.to_string())
    }
}

/// One identity's access to one module, as stored in the grants table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    #[serde(rename = "user_id")]
    pub identity_id: IdentityId,
    #[serde(rename = "modulo_nome")]
    pub module_key: String,
    #[serde(rename = "ativo")]
    pub active: bool,
}

impl Grant {
    pub fn new(identity_id: impl Into<IdentityId>, module_key: impl Into<String>, active: bool) -> Self {
        Self {
            identity_id: identity_id.into(),
            module_key: module_key.into(),
            active,
        }
    }

    pub fn active(identity_id: impl Into<IdentityId>, module_key: impl Into<String>) -> Self {
        Self::new(identity_id, module_key, true)
    }
}
