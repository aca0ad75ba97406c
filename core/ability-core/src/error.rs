//! Error types for ability-core operations.
//!
//! Lifecycle operations never panic across the ability boundary; every
//! failure mode is a variant here.

use crate::lifecycle::LifecycleState;
use crate::types::{AbilityKind, Token};

/// All errors that can occur in ability-core operations.
#[derive(Debug, thiserror::Error)]
pub enum AbilityError {
    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("ability not ready for {context}")]
    NotReady { context: String },

    #[error("ability already initialized")]
    AlreadyInitialized,

    #[error("illegal lifecycle transition to {target:?} from {from:?} for {kind:?} ability")]
    IllegalTransition {
        from: LifecycleState,
        target: LifecycleState,
        kind: AbilityKind,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Registry and Record Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("ability name is empty")]
    EmptyAbilityName,

    #[error("unsupported ability kind for {name}")]
    UnsupportedKind { name: String },

    #[error("no ability registered under {0}")]
    UnknownAbility(String),

    #[error("no ability hosted for token {0}")]
    UnknownToken(Token),

    #[error("ability already attached for token {0}")]
    AlreadyAttached(Token),

    // ─────────────────────────────────────────────────────────────────────
    // Data Ability Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("invalid uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("remote data ability call failed: {context}: {details}")]
    Remote { context: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch and I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("handler for {context} is gone")]
    HandlerGone { context: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AbilityError {
    pub fn not_ready(context: impl Into<String>) -> Self {
        AbilityError::NotReady {
            context: context.into(),
        }
    }

    pub fn remote(context: impl Into<String>, details: impl Into<String>) -> Self {
        AbilityError::Remote {
            context: context.into(),
            details: details.into(),
        }
    }
}

/// Convenience type alias for Results using AbilityError.
pub type Result<T> = std::result::Result<T, AbilityError>;

// Conversion for string error compatibility
impl From<AbilityError> for String {
    fn from(err: AbilityError) -> String {
        err.to_string()
    }
}
