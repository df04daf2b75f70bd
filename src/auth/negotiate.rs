// src/auth/negotiate.rs

//! HTTP Negotiate header codec (RFC 4559).
//!
//! Tokens travel as standard, padded base64 after the `Negotiate ` scheme
//! prefix in `Authorization` (client to server) and `WWW-Authenticate`
//! (server to client).

use base64::Engine as _;
use http::{HeaderMap, HeaderValue};

use crate::error;
use crate::Result;

const SCHEME: &str = "Negotiate";
const PREFIX: &str = "Negotiate ";

/// Extract the client token from the `Authorization` header.
///
/// Returns `None` when no credentials were offered: the header is missing,
/// not valid ASCII, or does not carry the `Negotiate ` scheme. A header that
/// carries the scheme with an undecodable payload yields `Some(Err(_))`.
pub fn parse_authorization(headers: &HeaderMap) -> Option<Result<Vec<u8>>> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix(PREFIX)?;
    Some(decode_token(encoded.trim()))
}

/// Decode a base64 Negotiate token.
pub fn decode_token(encoded: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(error::token_invalid)
}

/// Encode a Negotiate token as standard base64.
pub fn encode_token(token: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(token)
}

/// The bare `WWW-Authenticate: Negotiate` challenge.
pub fn challenge() -> HeaderValue {
    HeaderValue::from_static(SCHEME)
}

/// `WWW-Authenticate: Negotiate <base64>` carrying a continuation token.
pub fn continuation(token: &[u8]) -> HeaderValue {
    let value = format!("{PREFIX}{}", encode_token(token));
    // base64 output is always visible ASCII
    HeaderValue::from_str(&value).unwrap_or_else(|_| challenge())
}
