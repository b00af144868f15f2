use crate::catalog::Catalog;
use crate::permissions::AccessState;

/// Where navigation to a route should end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Access for the route is still being resolved; render a loading state
    Pending,
    Redirect(String),
}

/// Client-side route guard.
///
/// Signed-in users are bounced from the login page to the dashboard;
/// protected prefixes require a session; module routes also require the
/// module to be in the identity's allowed set. Static assets always pass.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    pub login_path: String,
    pub home_path: String,
    pub protected_prefixes: Vec<String>,
    pub module_prefix: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/dashboard".to_string(),
            protected_prefixes: vec![
                "/dashboard".to_string(),
                "/administracao".to_string(),
                "/admin".to_string(),
                "/modulos".to_string(),
            ],
            module_prefix: "/modulos/".to_string(),
        }
    }
}

const STATIC_PREFIXES: &[&str] = &["/_next/static", "/_next/image", "/favicon.ico"];
const STATIC_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "gif", "webp"];

fn route_path(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn is_static_asset(path: &str) -> bool {
    if STATIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    path.rsplit('/')
        .next()
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl RouteGuard {
    pub fn from_config(config: &crate::config::SessionConfig) -> Self {
        Self {
            login_path: config.login_path.clone(),
            home_path: config.home_path.clone(),
            ..Self::default()
        }
    }

    fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .map(|rest| rest.starts_with('/'))
                    .unwrap_or(false)
        })
    }

    /// Session-only check
    pub fn check(&self, path: &str, authenticated: bool) -> RouteDecision {
        let path = route_path(path);
        if is_static_asset(path) {
            return RouteDecision::Allow;
        }
        if path == self.login_path && authenticated {
            return RouteDecision::Redirect(self.home_path.clone());
        }
        if self.is_protected(path) && !authenticated {
            return RouteDecision::Redirect(self.login_path.clone());
        }
        RouteDecision::Allow
    }

    /// Session check plus module permission for routes under the module prefix
    pub fn check_module(&self, path: &str, authenticated: bool, access: &AccessState, catalog: &Catalog) -> RouteDecision {
        let decision = self.check(path, authenticated);
        if decision != RouteDecision::Allow || !route_path(path).starts_with(&self.module_prefix) {
            return decision;
        }

        match access {
            AccessState::Loading => RouteDecision::Pending,
            AccessState::Unauthenticated => RouteDecision::Redirect(self.login_path.clone()),
            AccessState::Failed { .. } => {
                RouteDecision::Redirect(format!("{}?error=permission_fetch_failed", self.home_path))
            }
            AccessState::Ready(_) => match catalog.module_for_route(path) {
                Some(module) if access.can_access(&module.key) => RouteDecision::Allow,
                _ => RouteDecision::Redirect(format!("{}?error=unauthorized", self.home_path)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModuleDescriptor;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            ModuleDescriptor::new("pdf", "Extrair PDF", "/modulos/pdf"),
            ModuleDescriptor::new("cobranca", "Cobrança", "/modulos/cobranca"),
        ])
        .unwrap()
    }

    #[test]
    fn session_rules() {
        let guard = RouteGuard::default();
        let cases = [
            ("/login", true, RouteDecision::Redirect("/dashboard".into())),
            ("/login", false, RouteDecision::Allow),
            ("/dashboard", false, RouteDecision::Redirect("/login".into())),
            ("/administracao/usuarios", false, RouteDecision::Redirect("/login".into())),
            ("/modulos/pdf?tab=logs", false, RouteDecision::Redirect("/login".into())),
            ("/dashboard", true, RouteDecision::Allow),
            ("/ativar-conta", false, RouteDecision::Allow),
            ("/dashboardx", false, RouteDecision::Allow),
            ("/modulos/logo.png", false, RouteDecision::Allow),
            ("/_next/static/chunk.js", false, RouteDecision::Allow),
        ];
        for (path, authenticated, expected) in cases {
            assert_eq!(guard.check(path, authenticated), expected, "path {} auth {}", path, authenticated);
        }
    }

    #[test]
    fn module_routes_require_grant() {
        let guard = RouteGuard::default();
        let c = catalog();
        let access = AccessState::Ready(vec![c.by_key("pdf").unwrap().clone()]);

        assert_eq!(guard.check_module("/modulos/pdf", true, &access, &c), RouteDecision::Allow);
        assert_eq!(
            guard.check_module("/modulos/cobranca", true, &access, &c),
            RouteDecision::Redirect("/dashboard?error=unauthorized".into())
        );
        assert_eq!(
            guard.check_module("/modulos/unknown", true, &access, &c),
            RouteDecision::Redirect("/dashboard?error=unauthorized".into())
        );
        assert_eq!(guard.check_module("/dashboard", true, &access, &c), RouteDecision::Allow);
    }

    #[test]
    fn module_routes_fail_closed() {
        let guard = RouteGuard::default();
        let c = catalog();
        let failed = AccessState::Failed {
            message: "boom".into(),
            retryable: true,
        };
        assert_eq!(
            guard.check_module("/modulos/pdf", true, &failed, &c),
            RouteDecision::Redirect("/dashboard?error=permission_fetch_failed".into())
        );
        assert_eq!(guard.check_module("/modulos/pdf", true, &AccessState::Loading, &c), RouteDecision::Pending);
    }
}
