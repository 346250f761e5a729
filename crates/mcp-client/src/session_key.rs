//! Session key derivation.
//!
//! A session key identifies the header set a pooled session was opened
//! with. Keys are order-independent: the header names are sorted before
//! the canonical form `{"name":"value",...}` is hashed with SHA-256.

use sha2::{Digest, Sha256};

use crate::transport::Headers;

/// Key shared by every caller when headers cannot influence the session.
pub const DEFAULT_SESSION_KEY: &str = "default";

/// Derive the pool key for `headers`.
///
/// Header-insensitive transports always map to [`DEFAULT_SESSION_KEY`],
/// whatever headers the caller passed, as does an empty header set.
pub fn session_key(headers: &Headers, header_sensitive: bool) -> String {
    if !header_sensitive || headers.is_empty() {
        return DEFAULT_SESSION_KEY.to_string();
    }

    let mut names: Vec<&String> = headers.keys().collect();
    names.sort();

    let pairs: Vec<String> = names
        .into_iter()
        .map(|name| format!("{}:{}", quote(name), quote(&headers[name])))
        .collect();
    let canonical = format!("{{{}}}", pairs.join(","));

    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn quote(s: &str) -> String {
    // Serializing a &str cannot fail.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
