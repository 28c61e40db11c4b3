//! Tower Layer for the grants refresh middleware.

use std::sync::Arc;

use tower_layer::Layer;

use crate::cache::PacketCache;
use crate::client::GrantsClient;
use crate::config::GrantsConfig;
use crate::error::{GrantsError, GrantsResult};
use crate::refresh::RefreshGate;
use crate::service::GrantsService;

/// Layer that runs the [`RefreshGate`] before the wrapped service.
///
/// Place it after the authentication layer that inserts the
/// [`Principal`](crate::Principal) into request extensions.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/things", get(handler))
///     .layer(GrantsLayer::new(gate))
///     .layer(auth_layer);
/// ```
#[derive(Debug, Clone)]
pub struct GrantsLayer {
    gate: RefreshGate,
}

impl GrantsLayer {
    #[must_use]
    pub fn new(gate: RefreshGate) -> Self {
        Self { gate }
    }

    /// Share an existing cache with the evaluator.
    ///
    /// Fails with [`GrantsError::InvalidConfig`] when the cache scope and
    /// `config.cache_scope` disagree.
    pub fn from_parts(
        cache: Arc<PacketCache>,
        client: Arc<dyn GrantsClient>,
        config: GrantsConfig,
    ) -> GrantsResult<Self> {
        RefreshGate::new(cache, client, Arc::new(config)).map(Self::new)
    }

    /// Build the layer with its own cache, scoped by `config.cache_scope`.
    /// Reach the cache through [`gate`](Self::gate) to build an evaluator.
    #[must_use]
    pub fn from_config(client: Arc<dyn GrantsClient>, config: GrantsConfig) -> Self {
        Self::new(RefreshGate::from_config(client, config))
    }

    #[must_use]
    pub fn gate(&self) -> &RefreshGate {
        &self.gate
    }
}

impl<S> Layer<S> for GrantsLayer {
    type Service = GrantsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrantsService::new(inner, self.gate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheScope;
    use crate::client::HttpGrantsClient;

    #[test]
    fn test_layer_shares_cache() {
        let config = GrantsConfig::builder()
            .base_uri("http://grants.local")
            .build()
            .unwrap();
        let cache = Arc::new(PacketCache::new());
        let client = Arc::new(HttpGrantsClient::new(&config).unwrap());
        let layer = GrantsLayer::from_parts(Arc::clone(&cache), client, config).unwrap();

        assert!(Arc::ptr_eq(layer.gate().cache(), &cache));
        assert!(Arc::ptr_eq(layer.clone().gate().cache(), &cache));
    }

    #[test]
    fn test_from_config_uses_configured_scope() {
        let config = GrantsConfig::builder()
            .base_uri("http://grants.local")
            .cache_scope(CacheScope::User)
            .build()
            .unwrap();
        let client = Arc::new(HttpGrantsClient::new(&config).unwrap());
        let layer = GrantsLayer::from_config(client, config);

        assert_eq!(layer.gate().cache().scope(), CacheScope::User);
    }

    #[test]
    fn test_from_parts_rejects_scope_mismatch() {
        let config = GrantsConfig::builder()
            .base_uri("http://grants.local")
            .cache_scope(CacheScope::User)
            .build()
            .unwrap();
        let client = Arc::new(HttpGrantsClient::new(&config).unwrap());
        let err = GrantsLayer::from_parts(Arc::new(PacketCache::new()), client, config)
            .unwrap_err();

        assert!(matches!(err, GrantsError::InvalidConfig(_)));
    }
}
