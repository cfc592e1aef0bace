//! # Faro
//!
//! `faro` is a small HTTP service that serves a personal link dashboard: a
//! categorized catalogue of bookmarks ("groups" of "links"), where selected
//! groups are gated behind a shared password.
//!
//! ## Access model
//!
//! The catalogue is public, but protected groups appear in it with their links
//! withheld. To read a protected group a client first proves knowledge of the
//! group password (`POST /api/auth/verify`), receiving a short-lived
//! HMAC-signed token bound to exactly that group. The token is self-describing:
//! the server keeps no session state and validates each request purely from the
//! token's signed contents and the current time.
//!
//! Tokens embed a fingerprint of the password hash that minted them, so
//! rotating a group password invalidates all outstanding tokens for it.
//!
//! Verification attempts are rate limited per calling identity (5 attempts per
//! rolling 15-minute window) to slow down password guessing.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
