//! Active userspace extraction.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HeaderMap, request::Parts},
};

use crate::error::UserspaceError;
use crate::ids::UserspaceId;

/// Header carrying the active userspace id.
pub const USERSPACE_HEADER: &str = "x-smon-userspace-id";

/// Read the active userspace from request headers.
///
/// Header names are matched case-insensitively; the first value wins and
/// surrounding whitespace is ignored.
///
/// # Errors
///
/// - [`UserspaceError::NotDefined`] when the header is absent.
/// - [`UserspaceError::Empty`] when it is present but blank.
/// - [`UserspaceError::InvalidValue`] when it is not an integer.
///
/// ```
/// use axum::http::HeaderMap;
/// use xavyo_grants::{userspace, UserspaceError, UserspaceId};
///
/// let mut headers = HeaderMap::new();
/// assert_eq!(userspace(&headers), Err(UserspaceError::NotDefined));
///
/// headers.insert("X-Smon-Userspace-Id", "123".parse().unwrap());
/// assert_eq!(userspace(&headers), Ok(UserspaceId::new(123)));
/// ```
pub fn userspace(headers: &HeaderMap) -> Result<UserspaceId, UserspaceError> {
    let value = headers
        .get(USERSPACE_HEADER)
        .ok_or(UserspaceError::NotDefined)?;

    let raw = value.to_str().map_err(|_| {
        UserspaceError::InvalidValue(String::from_utf8_lossy(value.as_bytes()).into_owned())
    })?;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UserspaceError::Empty);
    }

    trimmed
        .parse::<UserspaceId>()
        .map_err(|_| UserspaceError::InvalidValue(trimmed.to_string()))
}

/// Axum extractor for the active userspace.
///
/// Rejects with a 400 JSON body when the header is missing or malformed.
///
/// ```rust,ignore
/// async fn handler(Userspace(userspace_id): Userspace) -> String {
///     format!("userspace {userspace_id}")
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Userspace(pub UserspaceId);

#[async_trait]
impl<S> FromRequestParts<S> for Userspace
where
    S: Send + Sync,
{
    type Rejection = UserspaceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        userspace(&parts.headers).map(Userspace)
    }
}
