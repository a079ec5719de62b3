//! HTTP Digest access authentication (RFC 2617, MD5 only).
//!
//! The cameras answer an unauthenticated attach request with a 401
//! carrying a `WWW-Authenticate: Digest ...` challenge. We answer it
//! once; a second 401 means the credentials are wrong. Only the MD5
//! algorithm with `qop=auth` (or the legacy no-qop form) is supported,
//! which covers every firmware seen in the field.

use md5::{Digest as _, Md5};
use rand::{Rng, distributions::Alphanumeric};

use crate::error::{Error, Result};

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Splits a challenge parameter list on commas, ignoring commas inside
/// quoted strings (e.g. `qop="auth,auth-int"`).
fn split_params(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, b) in input.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// A parsed `WWW-Authenticate: Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    /// Normalized to `auth` when the server offers it; `None` selects
    /// the legacy RFC 2069 response computation.
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    /// Parses a `WWW-Authenticate` header value.
    pub fn parse(header: &str) -> Result<Self> {
        let (scheme, params) = header
            .split_once(' ')
            .ok_or_else(|| Error::DigestAuth("malformed challenge header".into()))?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return Err(Error::DigestAuth(format!(
                "unsupported auth scheme: {scheme}"
            )));
        }

        let mut realm = None;
        let mut nonce = None;
        let mut qop = None;
        let mut opaque = None;
        let mut algorithm = None;

        for param in split_params(params) {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let value = unquote(value.trim());
            match key.trim().to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value.to_string()),
                "nonce" => nonce = Some(value.to_string()),
                "qop" => qop = Some(value.to_string()),
                "opaque" => opaque = Some(value.to_string()),
                "algorithm" => algorithm = Some(value.to_string()),
                _ => {}
            }
        }

        let realm = realm.ok_or_else(|| Error::DigestAuth("challenge missing realm".into()))?;
        let nonce = nonce.ok_or_else(|| Error::DigestAuth("challenge missing nonce".into()))?;

        if let Some(alg) = &algorithm {
            if !alg.eq_ignore_ascii_case("md5") {
                return Err(Error::DigestAuth(format!("unsupported algorithm: {alg}")));
            }
        }

        // A server offering qop must offer plain "auth"; we do not
        // implement auth-int (no request bodies to integrity-protect).
        let qop = match qop {
            Some(offered) => {
                if offered.split(',').any(|token| token.trim() == "auth") {
                    Some("auth".to_string())
                } else {
                    return Err(Error::DigestAuth(format!("unsupported qop: {offered}")));
                }
            }
            None => None,
        };

        Ok(Self {
            realm,
            nonce,
            qop,
            opaque,
            algorithm,
        })
    }

    /// Builds the `Authorization` header value for one request.
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
        nc: u32,
    ) -> String {
        let ha1 = md5_hex(&format!("{username}:{}:{password}", self.realm));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let response = match &self.qop {
            Some(qop) => md5_hex(&format!(
                "{ha1}:{}:{nc:08x}:{cnonce}:{qop}:{ha2}",
                self.nonce
            )),
            None => md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce)),
        };

        let mut header = format!(
            "Digest username=\"{username}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", response=\"{response}\"",
            self.realm, self.nonce
        );
        if let Some(qop) = &self.qop {
            header.push_str(&format!(", qop={qop}, nc={nc:08x}, cnonce=\"{cnonce}\""));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        if self.algorithm.is_some() {
            header.push_str(", algorithm=MD5");
        }
        header
    }

    /// Answers the challenge with a fresh client nonce and `nc=1`.
    ///
    /// We never reuse a nonce across requests (each reconnect restarts
    /// the handshake), so the nonce count is always 1.
    pub fn answer(&self, username: &str, password: &str, method: &str, uri: &str) -> String {
        let cnonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        self.authorization(username, password, method, uri, &cnonce, 1)
    }
}

// ============================================================================
// Tests
// ============================================================================
