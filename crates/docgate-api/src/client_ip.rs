//! Client address extraction from proxy headers.
//!
//! Priority order: `X-Forwarded-For` (first entry), `X-Real-IP`,
//! `CF-Connecting-IP`, `True-Client-IP`. Registration records depend on this
//! order, so changing it changes which accounts cluster together.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

/// Headers consulted for the client address, highest priority first.
pub const CLIENT_IP_HEADERS: [&str; 4] = [
    "X-Forwarded-For",
    "X-Real-IP",
    "CF-Connecting-IP",
    "True-Client-IP",
];

/// First non-empty client address found in the priority headers.
pub fn client_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        // Only the forwarded chain has multiple entries; the first is the client.
        let first = value.split(',').next()?.trim();
        (!first.is_empty()).then(|| first.to_string())
    })
}

/// Extractor for the raw client address. `None` when no header carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientAddress
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddress(client_ip_from_headers(&parts.headers)))
    }
}
