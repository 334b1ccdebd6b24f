//! Error types for the artifact subsystem.
//!
//! Nothing here is fatal to the surrounding process: every failure
//! degrades to a user-visible message and a safe no-op state.

use thiserror::Error;

use crate::types::ArtifactId;

/// Top-level error type for all artifact operations.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// A name or id could not be resolved to any known artifact.
    /// Callers surface this as "no match", never a default guess.
    #[error("No artifact matches \"{name}\"")]
    NotFound {
        /// The raw text that failed to resolve.
        name: String,
    },

    /// The negotiation round cap was reached without narrowing the
    /// candidate set to a single version.
    #[error("Unable to find a matching version of {artifact} after {rounds} rounds")]
    AmbiguousNoWinner {
        /// Artifact under negotiation.
        artifact: ArtifactId,
        /// Rounds consumed before giving up.
        rounds: u8,
    },

    /// The player's inventory could not take the granted item.
    /// Recoverable: session state is unchanged and the grant may be
    /// retried once capacity frees up.
    #[error("Inventory capacity exceeded while granting \"{item}\"")]
    CapacityExceeded {
        /// Template name of the item that did not fit.
        item: String,
    },

    /// Two items may not be combined: mismatched artifacts, overlapping
    /// pages, or a sentinel operand.
    #[error("Invalid combination: {reason}")]
    InvalidCombination {
        /// Why the combination was rejected.
        reason: String,
    },

    /// SQLite error from a backing store.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ArtifactError>;
