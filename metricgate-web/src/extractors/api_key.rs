//! Shared-key extraction for Axum handlers

use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::collections::HashMap;
use std::convert::Infallible;

/// Header clients may use to present the shared key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// The key a client presented, if any.
///
/// Looked up in order: `X-API-Key` header, `Authorization: Bearer`, `?key=`.
/// Extraction never fails; comparing against the configured secret is the
/// ingestion layer's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKey(pub Option<String>);

impl ApiKey {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    fn from_parts(parts: &Parts) -> Self {
        let header_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bearer_key = || {
            parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        };

        let query_key = || {
            Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(mut params)| params.remove("key"))
        };

        Self(header_key.or_else(bearer_key).or_else(query_key))
    }
}

impl<S> FromRequestParts<S> for ApiKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
