//! CreatorLedger Types - Foundation types for the provenance ledger
//!
//! This crate provides:
//! - Validated creator identity types (`CreatorId`, `DisplayName`)
//! - The ledger event record and its invariant constants
//! - The canonical signed-byte encoding shared by producer and verifier
//!
//! It has no dependencies on the other creatorledger crates; everything
//! else in the workspace builds on top of it.

pub mod canonical;
pub mod event;
pub mod identity;

pub use canonical::*;
pub use event::*;
pub use identity::*;

use thiserror::Error;

/// Validation errors for the foundation types
#[derive(Debug, Clone, Error)]
pub enum TypesError {
    #[error("Invalid creator id: {reason}")]
    InvalidCreatorId { reason: String },

    #[error("Invalid display name: {reason}")]
    InvalidDisplayName { reason: String },

    #[error("Invalid event kind: {reason}")]
    InvalidEventKind { reason: String },
}

pub type Result<T> = std::result::Result<T, TypesError>;
