//! Token claims extraction.
//!
//! Tokens reaching this service were already verified by the gateway, so
//! only the payload segment is decoded here.

use axum::{extract::Request, middleware::Next, response::Response};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use xavyo_grants::{bearer_token, Principal};

/// Decode the payload segment of a JWT into a [`Principal`].
pub fn decode_principal(token: &str) -> Option<Principal> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    Some(Principal::from_json(&claims))
}

/// Insert the caller's [`Principal`] into request extensions when a bearer
/// token is present. Requests without one continue anonymously.
pub async fn claims_middleware(mut request: Request, next: Next) -> Response {
    let principal = bearer_token(request.headers())
        .as_deref()
        .and_then(decode_principal);

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    } else {
        tracing::debug!("No decodable bearer token, continuing anonymously");
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use xavyo_grants::{Identity, UserId};

    fn token(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn test_decode_principal() {
        let principal =
            decode_principal(&token(&serde_json::json!({ "sub": "42", "client_id": "ui" })))
                .unwrap();
        assert_eq!(principal.identity(), Identity::Known(UserId::new(42)));
        assert!(!principal.is_system_user());
    }

    #[test]
    fn test_decode_principal_rejects_garbage() {
        assert!(decode_principal("not-a-jwt").is_none());
        assert!(decode_principal("a.!!!.c").is_none());
        assert!(decode_principal(&format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1"))).is_none());
    }
}
