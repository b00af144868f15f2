use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PortalError, PortalResult};

/// One addressable portal feature (PDF splitter, billing, calculators...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Join key against permission grants
    pub key: String,
    pub name: String,
    /// Canonical route; the only identifier favorites may reference
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(key: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            path: path.into(),
            description: None,
            category: None,
            status: None,
            icon: None,
            color: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Case-insensitive match against name, description and key
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.key.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// Route slug used by early dashboard revisions: "Extrair PDF" -> "extrair-pdf"
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// The full set of modules the portal knows about, independent of access.
///
/// Construction validates that both `key` and `path` are unique; lookups by
/// either are then unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    modules: Vec<ModuleDescriptor>,
    by_key: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(modules: Vec<ModuleDescriptor>) -> PortalResult<Self> {
        let mut by_key = HashMap::with_capacity(modules.len());
        let mut by_path = HashMap::with_capacity(modules.len());

        for (idx, module) in modules.iter().enumerate() {
            if module.key.trim().is_empty() || module.path.trim().is_empty() {
                return Err(PortalError::InvalidCatalog(format!(
                    "module at position {} has an empty key or path",
                    idx
                )));
            }
            if by_key.insert(module.key.clone(), idx).is_some() {
                return Err(PortalError::InvalidCatalog(format!("duplicate module key '{}'", module.key)));
            }
            if by_path.insert(module.path.clone(), idx).is_some() {
                return Err(PortalError::InvalidCatalog(format!("duplicate module path '{}'", module.path)));
            }
        }

        Ok(Self { modules, by_key, by_path })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn by_key(&self, key: &str) -> Option<&ModuleDescriptor> {
        self.by_key.get(key).map(|&idx| &self.modules[idx])
    }

    pub fn by_path(&self, path: &str) -> Option<&ModuleDescriptor> {
        self.by_path.get(path).map(|&idx| &self.modules[idx])
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Translate a stored favorites entry to a canonical path.
    ///
    /// Accepts a canonical path, a legacy bare key, or a legacy name slug.
    /// Returns `None` when the entry maps to nothing in this catalog.
    pub fn canonical_path(&self, entry: &str) -> Option<&str> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        if let Some(module) = self.by_path(entry) {
            return Some(&module.path);
        }
        if let Some(module) = self.by_key(entry) {
            return Some(&module.path);
        }
        self.modules
            .iter()
            .find(|m| slugify(&m.name) == entry)
            .map(|m| m.path.as_str())
    }

    /// The module a route belongs to, matching `/modulos/pdf` and `/modulos/pdf/logs`
    pub fn module_for_route(&self, route: &str) -> Option<&ModuleDescriptor> {
        let route = route.split(['?', '#']).next().unwrap_or(route);
        self.modules.iter().find(|m| {
            route == m.path
                || route
                    .strip_prefix(m.path.as_str())
                    .map(|rest| rest.starts_with('/'))
                    .unwrap_or(false)
        })
    }
}
