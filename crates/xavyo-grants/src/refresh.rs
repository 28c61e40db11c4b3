//! Refresh gate.
//!
//! Runs once per request before any grant is evaluated:
//!
//! 1. system user: pass through,
//! 2. unresolvable subject: pass through,
//! 3. otherwise, if the cache entry is stale or missing, fetch the user's
//!    packets and store them with the configured TTL.
//!
//! Failures never block the request. A failed fetch is logged and cached as
//! an empty packet list, so the user holds no grants until the entry goes
//! stale again. Concurrent requests that observe the same stale entry each
//! fetch independently; the last write wins.

use std::sync::Arc;
use std::time::Instant;

use http::HeaderMap;
use tracing::{debug, error};

use crate::cache::PacketCache;
use crate::client::{GrantsClient, OutboundContext};
use crate::config::GrantsConfig;
use crate::error::{GrantsError, GrantsResult};
use crate::ids::UserId;
use crate::principal::{self, Identity, Principal};
use crate::userspace::userspace;

/// Why a request skipped the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThroughReason {
    SystemUser,
    UnknownSubject,
}

/// What the gate did for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No cache interaction.
    PassThrough(PassThroughReason),
    /// The cached entry was still fresh.
    Fresh,
    /// Packets were fetched and cached.
    Refreshed { packets: usize },
    /// The fetch failed; an empty list was cached.
    FetchFailed,
}

/// Request-scoped cache refresh.
#[derive(Clone)]
pub struct RefreshGate {
    cache: Arc<PacketCache>,
    client: Arc<dyn GrantsClient>,
    config: Arc<GrantsConfig>,
}

impl std::fmt::Debug for RefreshGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGate")
            .field("cache_entries", &self.cache.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RefreshGate {
    /// Build a gate over an existing cache.
    ///
    /// The cache scope must match `config.cache_scope`, otherwise keys
    /// written here would disagree with the configured scope.
    pub fn new(
        cache: Arc<PacketCache>,
        client: Arc<dyn GrantsClient>,
        config: Arc<GrantsConfig>,
    ) -> GrantsResult<Self> {
        if cache.scope() != config.cache_scope {
            return Err(GrantsError::InvalidConfig(format!(
                "cache scope '{}' does not match configured scope '{}'",
                cache.scope(),
                config.cache_scope
            )));
        }
        Ok(Self {
            cache,
            client,
            config,
        })
    }

    /// Build a gate with a fresh cache scoped by `config.cache_scope`.
    #[must_use]
    pub fn from_config(client: Arc<dyn GrantsClient>, config: GrantsConfig) -> Self {
        Self {
            cache: Arc::new(PacketCache::with_scope(config.cache_scope)),
            client,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<PacketCache> {
        &self.cache
    }

    /// Bring the caller's cache entry up to date.
    pub async fn refresh(
        &self,
        principal: Option<&Principal>,
        headers: &HeaderMap,
    ) -> RefreshOutcome {
        let started = Instant::now();

        if principal::is_system_user(principal) {
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "System user, skipping grants refresh"
            );
            return RefreshOutcome::PassThrough(PassThroughReason::SystemUser);
        }

        let (Some(principal), Identity::Known(user_id)) =
            (principal, principal::identity_of(principal))
        else {
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Subject unresolvable, skipping grants refresh"
            );
            return RefreshOutcome::PassThrough(PassThroughReason::UnknownSubject);
        };

        let userspace_id = userspace(headers).ok();
        let key = self
            .cache
            .key(user_id, userspace_id, principal.object_key());
        let context = OutboundContext::from_headers(headers);

        if self.config.resolve_system_packets {
            self.refresh_system_packets(user_id, &context).await;
        }

        if !self.cache.is_stale_or_missing(&key) {
            debug!(
                user_id = %user_id,
                userspace_id = ?userspace_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Cached grants are fresh"
            );
            return RefreshOutcome::Fresh;
        }

        let ttl = self.config.entry_ttl();
        match self.client.user_packets(user_id, &context).await {
            Ok(packets) => {
                let count = packets.len();
                self.cache.set(key, packets, ttl);
                debug!(
                    user_id = %user_id,
                    userspace_id = ?userspace_id,
                    packets = count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Grants refreshed"
                );
                RefreshOutcome::Refreshed { packets: count }
            }
            Err(e) => {
                error!(
                    user_id = %user_id,
                    userspace_id = ?userspace_id,
                    error = %e,
                    error_code = e.error_code(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Failed to fetch user packets, continuing without grants"
                );
                self.cache.set(key, Vec::new(), ttl);
                RefreshOutcome::FetchFailed
            }
        }
    }

    /// The role table is fetched once per user and kept; failures are retried
    /// on the next request.
    async fn refresh_system_packets(&self, user_id: UserId, context: &OutboundContext) {
        if self.cache.has_system_packet_maps(user_id) {
            return;
        }
        match self.client.system_packets(context).await {
            Ok(maps) => self.cache.set_system_packet_maps(user_id, maps),
            Err(e) => error!(
                user_id = %user_id,
                error = %e,
                error_code = e.error_code(),
                "Failed to fetch system packets"
            ),
        }
    }
}
