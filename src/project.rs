use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A workspace holding one conversation and its generated fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "calm", "crisp", "deft", "eager", "fleet", "gentle", "keen", "lively",
    "mellow", "nimble", "polished", "quick", "rustic", "sleek", "tidy", "vivid", "warm", "zesty",
];

const NOUNS: &[&str] = &[
    "anchor", "beacon", "canyon", "drift", "ember", "falcon", "garden", "harbor", "island",
    "junction", "kiln", "lantern", "meadow", "orchard", "prairie", "quarry", "ridge", "summit",
    "thicket", "willow",
];

/// Generate a two-word kebab project name that does not collide with any
/// existing name. Cycles adjective/noun pairs, then falls back to a numeric
/// suffix once every pair is taken.
pub fn generate_name(existing: &[String]) -> String {
    let seed = Uuid::new_v4().as_u128();
    let total = ADJECTIVES.len() * NOUNS.len();
    let start = (seed % total as u128) as usize;

    for offset in 0..total {
        let idx = (start + offset) % total;
        let name = format!("{}-{}", ADJECTIVES[idx % ADJECTIVES.len()], NOUNS[idx / ADJECTIVES.len()]);
        if !existing.iter().any(|n| n == &name) {
            return name;
        }
    }
    let mut i = 2;
    loop {
        let name = format!("project-{i}");
        if !existing.contains(&name) {
            return name;
        }
        i += 1;
    }
}
