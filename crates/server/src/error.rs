//! Collaborator failures surfaced to the session engine.
//!
//! None of these ever reach the player: the engine logs them and carries on
//! (render failures) or records them on the receipt (ledger failures).

use arcade_sim::OwnerId;

/// The resource ledger refused or failed a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger rejected credit for owner {owner}: {reason}")]
    Rejected { owner: OwnerId, reason: String },
}

/// The presentation layer could not accept a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("render sink closed")]
    Closed,
    #[error("render sink failed: {0}")]
    Failed(String),
}

/// The collectible lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    #[error("collection lookup failed for owner {owner}: {reason}")]
    Lookup { owner: OwnerId, reason: String },
}

/// The activity a session gates is not ready.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct NotReady(pub String);

/// An owner already has a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("owner {0} already has an active session")]
pub struct AlreadyActive(pub OwnerId);
