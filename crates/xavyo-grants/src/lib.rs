//! # xavyo-grants
//!
//! Permission-packet authorization for multi-tenant HTTP services.
//!
//! Users receive grants through *packets*: bundles of dotted grant names
//! (`base-system.work-group.roles-read`) bound to userspace / work-group
//! owners. This crate fetches a user's packets from the authorization
//! server, caches them with a TTL and answers grant queries against the
//! cache.
//!
//! ## Features
//!
//! - **Packet Cache**: concurrent, keyed per user (and userspace / object key), logical TTL
//! - **Grant Evaluator**: any / all / work-group / userspace queries behind an object-safe trait
//! - **Refresh Middleware**: Tower Layer/Service that refreshes stale entries before the handler runs
//! - **Userspace Extraction**: `x-smon-userspace-id` header parsing with structured 400 errors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::{routing::get, Extension, Router};
//! use xavyo_grants::{
//!     CachedGrantEvaluator, GrantEvaluator, GrantsConfig, GrantsLayer, HttpGrantsClient,
//!     Principal, Userspace, WorkGroupId,
//! };
//!
//! let config = GrantsConfig::from_env()?;
//! let client = Arc::new(HttpGrantsClient::new(&config)?);
//! let grants_layer = GrantsLayer::from_config(client, config);
//! let evaluator: Arc<dyn GrantEvaluator> =
//!     Arc::new(CachedGrantEvaluator::new(grants_layer.gate().cache().clone()));
//!
//! async fn read_roles(
//!     Extension(principal): Extension<Principal>,
//!     Extension(grants): Extension<Arc<dyn GrantEvaluator>>,
//!     Userspace(userspace_id): Userspace,
//! ) -> String {
//!     let allowed = grants.has_grant(
//!         Some(&principal),
//!         userspace_id,
//!         WorkGroupId::new(5),
//!         "base-system.work-group.roles-read",
//!     );
//!     format!("allowed: {allowed}")
//! }
//!
//! let app = Router::new()
//!     .route("/roles", get(read_roles))
//!     .layer(Extension(evaluator))
//!     .layer(grants_layer);
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod ids;
mod layer;
pub mod model;
pub mod names;
pub mod principal;
pub mod refresh;
mod service;
pub mod userspace;

pub use cache::{CacheEntry, CacheKey, CacheScope, PacketCache};
pub use client::{bearer_token, GrantsClient, HttpGrantsClient, OutboundContext};
pub use config::{ConfigError, GrantsConfig, GrantsConfigBuilder};
pub use error::{ErrorResponse, GrantsError, GrantsResult, UserspaceError};
pub use evaluator::{CachedGrantEvaluator, GrantEvaluator};
pub use ids::{PacketId, UserId, UserspaceId, WorkGroupId};
pub use layer::GrantsLayer;
pub use model::{Packet, PacketOwner, PacketType, SystemPacketMap};
pub use names::Grant;
pub use principal::{Identity, Principal};
pub use refresh::{PassThroughReason, RefreshGate, RefreshOutcome};
pub use service::{GrantsService, GrantsServiceFuture};
pub use userspace::{userspace, Userspace, USERSPACE_HEADER};
