//! Remote grants client (reqwest-based).
//!
//! Talks to the authorization server's user-grants API:
//!
//! - `GET {base}/api/pl/user-grants/users/{userId}/packets`
//! - `GET {base}/api/pl/user-grants/meta/system-packets`
//!
//! Each call forwards the caller's bearer token and a fixed allow-list of
//! inbound headers.

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::GrantsConfig;
use crate::error::{GrantsError, GrantsResult};
use crate::ids::{UserId, UserspaceId};
use crate::model::{Packet, SystemPacketMap};
use crate::userspace::{userspace, USERSPACE_HEADER};

/// Trace correlation header.
pub const TRACE_EVENT_HEADER: &str = "x-trace-event-id";

/// Inbound headers copied verbatim onto outbound calls.
pub const FORWARDED_HEADERS: [&str; 2] = [TRACE_EVENT_HEADER, USERSPACE_HEADER];

const BEARER: &str = "Bearer";

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively and must be followed by
/// whitespace. Returns `None` for other schemes or an empty token.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.get(..BEARER.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER) {
        return None;
    }
    let rest = &value[BEARER.len()..];
    if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Per-request data forwarded to the authorization server.
#[derive(Debug, Clone, Default)]
pub struct OutboundContext {
    pub bearer_token: Option<String>,
    pub userspace_id: Option<UserspaceId>,
    pub forwarded: HeaderMap,
}

impl OutboundContext {
    /// Capture the bearer token, the active userspace and the allow-listed
    /// headers of an inbound request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut forwarded = HeaderMap::new();
        for name in FORWARDED_HEADERS {
            if let Some(value) = headers.get(name) {
                forwarded.insert(HeaderName::from_static(name), value.clone());
            }
        }

        Self {
            bearer_token: bearer_token(headers),
            userspace_id: userspace(headers).ok(),
            forwarded,
        }
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_userspace(mut self, userspace_id: UserspaceId) -> Self {
        self.userspace_id = Some(userspace_id);
        self
    }

    /// Outbound header set: forwarded headers, then the dedicated userspace
    /// and authorization headers.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        let mut headers = self.forwarded.clone();
        if let Some(userspace_id) = self.userspace_id {
            headers.insert(
                HeaderName::from_static(USERSPACE_HEADER),
                HeaderValue::from(userspace_id.get()),
            );
        }
        if let Some(value) = self
            .bearer_token
            .as_deref()
            .and_then(|token| HeaderValue::from_str(&format!("{BEARER} {token}")).ok())
        {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }
}

/// Source of permission packets.
#[async_trait]
pub trait GrantsClient: Send + Sync {
    /// Packets granted to `user_id`.
    async fn user_packets(
        &self,
        user_id: UserId,
        context: &OutboundContext,
    ) -> GrantsResult<Vec<Packet>>;

    /// The system-packet role table.
    async fn system_packets(
        &self,
        context: &OutboundContext,
    ) -> GrantsResult<Vec<SystemPacketMap>>;
}

/// [`GrantsClient`] calling the authorization server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGrantsClient {
    http_client: Client,
    base_uri: String,
}

impl HttpGrantsClient {
    /// Build a client with the configured timeout.
    pub fn new(config: &GrantsConfig) -> GrantsResult<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("xavyo-grants/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GrantsError::InvalidConfig(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self::with_http_client(http_client, &config.base_uri))
    }

    /// Use a preconfigured reqwest client.
    #[must_use]
    pub fn with_http_client(http_client: Client, base_uri: &str) -> Self {
        Self {
            http_client,
            base_uri: base_uri.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        url: &str,
        context: &OutboundContext,
    ) -> GrantsResult<Vec<T>> {
        debug!("grants GET {}", url);
        let response = self
            .http_client
            .get(url)
            .headers(context.headers())
            .send()
            .await?;
        handle_response(response).await
    }
}

#[async_trait]
impl GrantsClient for HttpGrantsClient {
    async fn user_packets(
        &self,
        user_id: UserId,
        context: &OutboundContext,
    ) -> GrantsResult<Vec<Packet>> {
        let url = format!("{}/api/pl/user-grants/users/{user_id}/packets", self.base_uri);
        self.get_list(&url, context).await
    }

    async fn system_packets(
        &self,
        context: &OutboundContext,
    ) -> GrantsResult<Vec<SystemPacketMap>> {
        let url = format!("{}/api/pl/user-grants/meta/system-packets", self.base_uri);
        self.get_list(&url, context).await
    }
}

/// A JSON `null` body is read as an empty list.
async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> GrantsResult<Vec<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(GrantsError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    serde_json::from_str::<Option<Vec<T>>>(&body)
        .map(Option::unwrap_or_default)
        .map_err(|e| GrantsError::Parse(format!("Failed to parse response: {e}")))
}
