//! Signing and verification of access tokens.
//!
//! A token is a compact JWT (`header.claims.signature`, base64url segments)
//! signed with HMAC-SHA256 under the process signing key. The server stores
//! nothing per token: validity is reconstructed from the signed contents plus
//! the current time, so a restart with a different key invalidates everything
//! outstanding.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const TOKEN_VERSION: u8 = 1;
/// Tokens are valid for 24 hours from issuance.
pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
/// Human-readable TTL reported to clients.
pub const TOKEN_TTL_LABEL: &str = "24h";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavTokenHeader {
    pub alg: String,
    pub typ: String,
}

impl NavTokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Decoded token payload: one token is bound to exactly one group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavClaims {
    pub v: u8,
    /// Group id this token grants access to.
    pub gid: u32,
    pub gname: String,
    /// Fingerprint of the password hash that minted the token; rotating a
    /// group password therefore invalidates outstanding tokens.
    pub phf: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid key length")]
    KeyLength,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid token version")]
    InvalidVersion,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Short fingerprint of a stored password hash, embedded in claims.
#[must_use]
pub fn hash_fingerprint(password_hash: &str) -> String {
    let digest = Sha256::digest(password_hash.as_bytes());
    Base64UrlUnpadded::encode_string(&digest[..8])
}

/// Create an HS256 signed access token.
///
/// # Errors
///
/// Returns an error if claims/header JSON cannot be encoded or the key is
/// unusable.
pub fn sign_hs256(secret: &[u8], claims: &NavClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&NavTokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::KeyLength)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 access token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the signature does not verify,
/// - the claims fail validation (`v`, `exp`).
pub fn verify_hs256(token: &str, secret: &[u8], now_unix_seconds: i64) -> Result<NavClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: NavTokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::KeyLength)?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    // Constant-time comparison via the Mac trait.
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: NavClaims = b64d_json(claims_b64)?;
    if claims.v != TOKEN_VERSION {
        return Err(Error::InvalidVersion);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}
