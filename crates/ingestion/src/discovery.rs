//! Plugin base-URL discovery.

use std::collections::HashMap;

use async_trait::async_trait;
use incr_core::BackendConfig;
use tracing::debug;
use url::Url;

use crate::error::IngestionError;

/// Resolves the base URL of a backend plugin, e.g. `catalog`.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn base_url(&self, plugin_id: &str) -> Result<String, IngestionError>;
}

/// Discovery from static configuration.
///
/// Plugins live at `{backend}/api/{plugin_id}` unless overridden.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    backend: String,
    overrides: HashMap<String, String>,
}

impl StaticDiscovery {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into().trim_end_matches('/').to_string(),
            overrides: HashMap::new(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let mut discovery = Self::new(config.base_url.clone());
        for (plugin_id, url) in &config.plugins {
            discovery = discovery.with_override(plugin_id.clone(), url.clone());
        }
        discovery
    }

    pub fn with_override(mut self, plugin_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.overrides.insert(
            plugin_id.into(),
            url.into().trim_end_matches('/').to_string(),
        );
        self
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn base_url(&self, plugin_id: &str) -> Result<String, IngestionError> {
        let resolved = match self.overrides.get(plugin_id) {
            Some(url) => url.clone(),
            None => format!("{}/api/{}", self.backend, urlencoding::encode(plugin_id)),
        };
        Url::parse(&resolved).map_err(|e| IngestionError::Discovery {
            plugin_id: plugin_id.to_string(),
            message: format!("invalid base URL '{resolved}': {e}"),
        })?;
        debug!(plugin_id, url = %resolved, "resolved plugin base URL");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_convention() {
        let discovery = StaticDiscovery::new("http://localhost:7007/");
        assert_eq!(
            discovery.base_url("catalog").await.unwrap(),
            "http://localhost:7007/api/catalog"
        );
    }

    #[tokio::test]
    async fn override_wins() {
        let discovery = StaticDiscovery::new("http://localhost:7007")
            .with_override("catalog", "https://catalog.internal/api/catalog/");
        assert_eq!(
            discovery.base_url("catalog").await.unwrap(),
            "https://catalog.internal/api/catalog"
        );
        assert_eq!(
            discovery.base_url("search").await.unwrap(),
            "http://localhost:7007/api/search"
        );
    }

    #[tokio::test]
    async fn from_config_applies_overrides() {
        let mut config = BackendConfig::default();
        config.base_url = "http://backend:7007".into();
        config
            .plugins
            .insert("catalog".into(), "http://catalog:9000".into());
        let discovery = StaticDiscovery::from_config(&config);
        assert_eq!(discovery.base_url("catalog").await.unwrap(), "http://catalog:9000");
    }

    #[tokio::test]
    async fn invalid_backend_is_a_discovery_error() {
        let discovery = StaticDiscovery::new("not a url");
        let err = discovery.base_url("catalog").await.unwrap_err();
        assert!(matches!(err, IngestionError::Discovery { .. }));
    }
}
