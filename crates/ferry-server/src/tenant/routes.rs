//! Static tenant route table

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Immutable tenant id to connection string map. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct TenantRoutes {
    routes: Arc<HashMap<String, String>>,
}

impl TenantRoutes {
    /// Load `{"tenant-id": "postgres://..."}` from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ferry_common::Result<Self> {
        let routes: HashMap<String, String> = ferry_common::files::load_json_file(path)?;

        if let Some((tenant, _)) = routes.iter().find(|(_, dsn)| dsn.trim().is_empty()) {
            return Err(ferry_common::FerryError::config(format!(
                "tenant '{}' has an empty connection string",
                tenant
            )));
        }

        Ok(Self::from_iter(routes))
    }

    pub fn resolve(&self, tenant_id: &str) -> Option<&str> {
        self.routes.get(tenant_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Tenant ids, sorted.
    pub fn tenants(&self) -> Vec<&str> {
        let mut tenants: Vec<_> = self.routes.keys().map(String::as_str).collect();
        tenants.sort_unstable();
        tenants
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TenantRoutes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            routes: Arc::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let routes = TenantRoutes::from_iter([("acme", "postgres://db/acme")]);
        assert_eq!(routes.resolve("acme"), Some("postgres://db/acme"));
        assert_eq!(routes.resolve("globex"), None);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenants.json");
        std::fs::write(
            &path,
            r#"{"beta": "postgres://db/beta", "acme": "postgres://db/acme"}"#,
        )
        .unwrap();

        let routes = TenantRoutes::from_json_file(&path).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes.tenants(), vec!["acme", "beta"]);
    }

    #[test]
    fn test_empty_dsn_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenants.json");
        std::fs::write(&path, r#"{"acme": " "}"#).unwrap();

        assert!(TenantRoutes::from_json_file(&path).is_err());
    }
}
