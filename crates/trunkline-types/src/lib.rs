//! Shared types for the Trunkline call engine.
//!
//! This crate provides the foundational vocabulary used across all Trunkline
//! crates: the language adapter that normalizes the provider's BCP-47 tags to
//! internal two-letter codes, the per-language voice selection table, and the
//! chat-turn types exchanged with the reasoning backend.
//!
//! No crate in the workspace depends on anything *except* `trunkline-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

mod lang;
pub mod voice;

pub use lang::Language;
pub use voice::VoiceSelection;

use serde::{Deserialize, Serialize};

/// Speaker role of one conversation turn, as understood by the reasoning
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The caller's transcribed utterance.
    User,
    /// The engine's reply.
    Assistant,
}

impl Role {
    /// Returns the wire label for this role.
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One (role, text) turn of the conversation held with the reasoning backend.
///
/// Turns are append-only within a call and cleared when the call ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}
