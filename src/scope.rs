//! Tenant/namespace scoping for graph partitions.
//!
//! Every node and edge carries a scope partition key derived from the caller's
//! user/agent identifiers. The partition is a hard visibility boundary: reads
//! and writes never cross it, with one defined exception; an agent-scoped
//! read also sees the parent user's un-agent-scoped memories (a read-side
//! union, not a storage-side merge).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::errors::{MemoryError, Result};

static ID_SANITIZE_RE: OnceLock<Regex> = OnceLock::new();

fn id_sanitize_re() -> &'static Regex {
    ID_SANITIZE_RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static regex is valid"))
}

/// Replace any character outside `[A-Za-z0-9_-]` with `_`.
fn sanitize_id(value: &str) -> String {
    id_sanitize_re().replace_all(value.trim(), "_").to_string()
}

/// A resolved tenant/namespace key.
///
/// Equality of [`ScopeKey::partition`] is the boundary every other component
/// partitions by. Construction goes through [`ScopeKey::resolve`], which is a
/// pure function with no side effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    user: String,
    agent: Option<String>,
    /// Optional session tag, carried onto episodes but not part of the
    /// partition key.
    session: Option<String>,
}

impl ScopeKey {
    /// Derive a scope key from caller identifiers.
    ///
    /// Fails with [`MemoryError::InvalidScope`] if `user_id` is empty (or
    /// empty after trimming). `agent_id` and `session_id` are optional;
    /// empty strings are treated as absent.
    pub fn resolve(
        user_id: &str,
        agent_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Self> {
        let user = sanitize_id(user_id);
        if user.is_empty() {
            return Err(MemoryError::InvalidScope(
                "user_id is required".to_string(),
            ));
        }

        let agent = agent_id
            .map(sanitize_id)
            .filter(|a| !a.is_empty());
        let session = session_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            user,
            agent,
            session,
        })
    }

    /// The storage partition key: `user` or `user:agent`.
    pub fn partition(&self) -> String {
        match &self.agent {
            Some(agent) => format!("{}:{}", self.user, agent),
            None => self.user.clone(),
        }
    }

    /// Partition keys visible to reads under this scope.
    ///
    /// An agent-scoped query also sees the parent user's partition; a plain
    /// user scope sees only its own.
    pub fn read_keys(&self) -> Vec<String> {
        match &self.agent {
            Some(agent) => vec![self.user.clone(), format!("{}:{}", self.user, agent)],
            None => vec![self.user.clone()],
        }
    }

    /// The session tag, if one was supplied.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// The sanitized user identifier.
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.partition())
    }
}
