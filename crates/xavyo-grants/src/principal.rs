//! Claims-bearing principal and identity resolution.
//!
//! The host's authentication layer verifies the access token and inserts a
//! [`Principal`] into the request extensions. Everything in this crate only
//! reads claims from it.

use std::collections::BTreeMap;

use crate::ids::UserId;

/// Subject claim (the numeric user id).
pub const SUBJECT_CLAIM: &str = "sub";

/// Client identity claim.
pub const CLIENT_ID_CLAIM: &str = "client_id";

/// Reserved `client_id` value of the system user (compared case-insensitively).
pub const SYSTEM_CLIENT_ID: &str = "smon-res-owner";

/// Optional claim scoping the cache to one service-account object.
pub const OBJECT_KEY_CLAIM: &str = "object_key";

/// Resolved identity of the caller.
///
/// Collaborators that still speak the integer convention can round-trip
/// through [`Identity::as_sentinel`] / [`Identity::from_sentinel`]
/// (`-1` system user, `0` unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A regular user with a positive id.
    Known(UserId),
    /// The privileged system client.
    System,
    /// No usable subject.
    Unknown,
}

impl Identity {
    pub const SYSTEM_SENTINEL: i64 = -1;
    pub const UNKNOWN_SENTINEL: i64 = 0;

    /// Integer form: the user id, `-1` for the system user, `0` when unknown.
    #[must_use]
    pub fn as_sentinel(&self) -> i64 {
        match self {
            Identity::Known(id) => id.get(),
            Identity::System => Self::SYSTEM_SENTINEL,
            Identity::Unknown => Self::UNKNOWN_SENTINEL,
        }
    }

    /// Inverse of [`Identity::as_sentinel`]. Other non-positive values are unknown.
    #[must_use]
    pub fn from_sentinel(raw: i64) -> Self {
        match raw {
            Self::SYSTEM_SENTINEL => Identity::System,
            raw if raw > 0 => Identity::Known(UserId::new(raw)),
            _ => Identity::Unknown,
        }
    }

    /// The user id for a known user.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identity::Known(id) => Some(*id),
            Identity::System | Identity::Unknown => None,
        }
    }
}

/// Claims of the authenticated caller.
///
/// # Example
///
/// ```
/// use xavyo_grants::{Identity, Principal, UserId};
///
/// let principal = Principal::new().with_claim("sub", "42");
/// assert_eq!(principal.identity(), Identity::Known(UserId::new(42)));
///
/// let system = Principal::new().with_claim("client_id", "SMON-RES-OWNER");
/// assert!(system.is_system_user());
/// assert_eq!(system.identity(), Identity::System);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    claims: BTreeMap<String, String>,
}

impl Principal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a claim.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Build a principal from a decoded token payload.
    ///
    /// Scalar claims are kept in their string form; arrays, objects and
    /// nulls are dropped since no rule here reads them.
    #[must_use]
    pub fn from_json(payload: &serde_json::Value) -> Self {
        let claims = payload
            .as_object()
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(name, value)| {
                        let value = match value {
                            serde_json::Value::String(s) => s.clone(),
                            serde_json::Value::Number(n) => n.to_string(),
                            serde_json::Value::Bool(b) => b.to_string(),
                            _ => return None,
                        };
                        Some((name.clone(), value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { claims }
    }

    /// Raw claim value, `None` when absent or blank.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Whether the `client_id` claim carries the reserved system value.
    #[must_use]
    pub fn is_system_user(&self) -> bool {
        self.claim(CLIENT_ID_CLAIM)
            .is_some_and(|client_id| client_id.eq_ignore_ascii_case(SYSTEM_CLIENT_ID))
    }

    /// Resolve the subject.
    ///
    /// A present subject must parse to a positive integer, otherwise the
    /// caller is unknown. Negative ids such as `-5` are unknown too: they
    /// collide with the `-1` system sentinel and can never own packets, so
    /// the refresh gate passes them through without a fetch. Without a
    /// subject the caller is the system user only if it carries the system
    /// client identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        match self.claim(SUBJECT_CLAIM) {
            Some(sub) => match sub.trim().parse::<i64>() {
                Ok(raw) if raw > 0 => Identity::Known(UserId::new(raw)),
                _ => Identity::Unknown,
            },
            None if self.is_system_user() => Identity::System,
            None => Identity::Unknown,
        }
    }

    /// Service-account object key, if the token is scoped to one.
    #[must_use]
    pub fn object_key(&self) -> Option<&str> {
        self.claim(OBJECT_KEY_CLAIM)
    }
}

/// [`Principal::identity`] for an optional principal.
#[must_use]
pub fn identity_of(principal: Option<&Principal>) -> Identity {
    principal.map_or(Identity::Unknown, Principal::identity)
}

/// [`Principal::is_system_user`] for an optional principal.
#[must_use]
pub fn is_system_user(principal: Option<&Principal>) -> bool {
    principal.is_some_and(Principal::is_system_user)
}
