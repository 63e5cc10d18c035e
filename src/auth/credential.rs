//! Credential extraction from inbound requests.
//!
//! Sources are tried in a fixed priority order and the first non-empty value
//! wins:
//! 1. `Authorization: Bearer <token>`
//! 2. `X-API-Key` header
//! 3. `token` cookie
//! 4. `api_key` query parameter
//!
//! Values that fail to parse fall through to the next source.

use std::collections::HashMap;

use axum::{
    extract::Query,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap, Uri,
    },
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TOKEN_COOKIE: &str = "token";
pub const API_KEY_QUERY_PARAM: &str = "api_key";

/// Where a candidate credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    BearerHeader,
    ApiKeyHeader,
    Cookie,
    QueryParam,
}

/// A candidate API credential pulled from a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub source: CredentialSource,
    pub value: String,
}

impl Credential {
    /// First few characters of the value, safe to log.
    pub fn prefix(&self) -> &str {
        let end = self
            .value
            .char_indices()
            .nth(8)
            .map_or(self.value.len(), |(idx, _)| idx);
        &self.value[..end]
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("source", &self.source)
            .field("prefix", &self.prefix())
            .finish()
    }
}

/// Extract at most one candidate credential from the request.
pub fn extract_credential(parts: &Parts) -> Option<Credential> {
    let headers = &parts.headers;

    bearer_token(headers)
        .map(|value| (CredentialSource::BearerHeader, value))
        .or_else(|| api_key_header(headers).map(|value| (CredentialSource::ApiKeyHeader, value)))
        .or_else(|| {
            cookie_value(headers, TOKEN_COOKIE).map(|value| (CredentialSource::Cookie, value))
        })
        .or_else(|| {
            query_param(&parts.uri, API_KEY_QUERY_PARAM)
                .map(|value| (CredentialSource::QueryParam, value))
        })
        .map(|(source, value)| Credential { source, value })
}

/// Token from the first `Authorization` header, if it uses the bearer scheme.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(|c: char| c.is_ascii_whitespace())?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    non_empty(token.trim())
}

fn api_key_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(API_KEY_HEADER)?.to_str().ok()?;
    non_empty(value.trim())
}

/// Value of the named cookie across all `Cookie` headers. The first pair with
/// a matching name decides.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))?;
    non_empty(value)
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    params.get(name).and_then(|value| non_empty(value))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
