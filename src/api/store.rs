//! In-memory catalogue of link groups.
//!
//! The store is loaded once at startup from a JSON seed and is read-only for
//! the life of the process. It is handed to request handlers through the
//! shared [`crate::api::AppState`] rather than a module-level singleton, so
//! tests can swap in fixtures.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

const BUILTIN_SEED: &str = include_str!("../../data/groups.json");

/// A single bookmark inside a group.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub url: String,
    pub description: String,
}

/// A named collection of links, optionally password protected.
///
/// `Group` deliberately does not implement `Serialize`: everything that leaves
/// the server goes through [`GroupView`] or the protected-group response,
/// neither of which carries the password hash.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub is_protected: bool,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Catalogue view of a group: protected groups keep their links withheld.
#[derive(ToSchema, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub is_protected: bool,
    pub links: Vec<Link>,
}

impl GroupView {
    fn from_group(group: &Group) -> Self {
        let links = if group.is_protected {
            Vec::new()
        } else {
            group.links.clone()
        };
        Self {
            id: group.id,
            name: group.name.clone(),
            description: group.description.clone(),
            is_protected: group.is_protected,
            links,
        }
    }
}

#[derive(Deserialize, Debug)]
struct Seed {
    groups: Vec<Group>,
}

#[derive(Debug, Clone)]
pub struct NavStore {
    groups: Vec<Group>,
}

impl NavStore {
    /// Parse a JSON seed into a store.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed, a group id repeats, or a
    /// group breaks the invariant `password_hash present iff is_protected`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let seed: Seed = serde_json::from_str(raw).context("failed to parse groups seed")?;

        let mut seen = HashSet::new();
        for group in &seed.groups {
            ensure!(seen.insert(group.id), "duplicate group id {}", group.id);
            ensure!(
                group.password_hash.is_some() == group.is_protected,
                "group {} must carry a password hash iff it is protected",
                group.id
            );
        }

        Ok(Self {
            groups: seed.groups,
        })
    }

    /// The embedded default catalogue.
    ///
    /// # Errors
    /// Returns an error if the embedded seed is invalid.
    pub fn builtin_seed() -> Result<Self> {
        Self::from_json(BUILTIN_SEED)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn protected_count(&self) -> usize {
        self.groups.iter().filter(|group| group.is_protected).count()
    }

    /// Every group as a catalogue view, hashes stripped and protected links
    /// withheld.
    #[must_use]
    pub fn catalogue(&self) -> Vec<GroupView> {
        self.groups.iter().map(GroupView::from_group).collect()
    }

    /// Look up a group that exists *and* is password protected.
    ///
    /// Callers that answer clients must not distinguish "no such group" from
    /// "group exists but is not protected"; collapsing both into `None` here
    /// keeps that property.
    #[must_use]
    pub fn protected_group(&self, id: u32) -> Option<&Group> {
        self.groups
            .iter()
            .find(|group| group.id == id && group.is_protected)
    }
}
