//! Collaborators owned by the surrounding system, plus in-memory stand-ins.
//!
//! The engine only ever calls these at the edges: the gate and collection
//! lookup when a session starts, the sink after every mutation, and the
//! ledger once per finished session.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use arcade_sim::{BoardFrame, OwnerId, Variant};
use arcade_wire::{BoardFrameProto, SessionEndedProto};
use tokio::sync::mpsc;

use crate::bonus::{CollectionSnapshot, ResourceKind};
use crate::error::{CollectionError, LedgerError, NotReady, RenderError};
use crate::settlement::RewardReceipt;

// ============================================================================
// Collaborator Traits
// ============================================================================

/// External resource counters.
pub trait ResourceLedger: Send + Sync + 'static {
    /// Atomically add `amount` of `kind` to the owner's counter.
    fn credit(
        &self,
        owner: OwnerId,
        kind: ResourceKind,
        amount: u64,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Clear the production cooldown a session was standing in for.
    fn release_production_lock(
        &self,
        owner: OwnerId,
        kind: ResourceKind,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

/// Owned-collectible lookup feeding the bonus resolver.
pub trait CollectionSource: Send + Sync + 'static {
    fn snapshot(
        &self,
        owner: OwnerId,
    ) -> impl Future<Output = Result<CollectionSnapshot, CollectionError>> + Send;
}

/// Preconditions owned by other subsystems (e.g. the activity is ready).
pub trait ActivityGate: Send + Sync + 'static {
    fn check_ready(
        &self,
        owner: OwnerId,
        variant: Variant,
    ) -> impl Future<Output = Result<(), NotReady>> + Send;
}

/// Presentation layer. Calls are made while the session guard is held, so
/// implementations must not block.
pub trait RenderSink: Send + Sync + 'static {
    fn present(&self, owner: OwnerId, frame: &BoardFrame) -> Result<(), RenderError>;

    fn session_ended(&self, summary: &SessionSummary) -> Result<(), RenderError>;
}

/// Final word on a session, as announced to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub owner: OwnerId,
    pub variant: Variant,
    /// Terminal reason name, or "aborted".
    pub reason: &'static str,
    pub score: u32,
    /// Final board, if it could still be rendered.
    pub frame: Option<BoardFrame>,
    pub receipt: Option<RewardReceipt>,
}

impl From<&SessionSummary> for SessionEndedProto {
    fn from(summary: &SessionSummary) -> Self {
        let (reward_kind, reward_amount, credited) = match &summary.receipt {
            Some(receipt) => (
                receipt.kind.as_str().to_string(),
                receipt.amount,
                receipt.credited,
            ),
            None => (String::new(), 0, false),
        };
        Self {
            owner_id: summary.owner,
            variant: summary.variant.as_str().to_string(),
            end_reason: summary.reason.to_string(),
            score: summary.score,
            reward_kind,
            reward_amount,
            credited,
        }
    }
}

// ============================================================================
// In-Memory Ledger
// ============================================================================

#[derive(Debug, Default)]
struct LedgerBook {
    balances: HashMap<(OwnerId, ResourceKind), u64>,
    credits: Vec<(OwnerId, ResourceKind, u64)>,
    locks: HashSet<(OwnerId, ResourceKind)>,
    frozen: HashSet<OwnerId>,
    failing: bool,
}

/// Ledger kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    book: Mutex<LedgerBook>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self) -> std::sync::MutexGuard<'_, LedgerBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn balance(&self, owner: OwnerId, kind: ResourceKind) -> u64 {
        self.book().balances.get(&(owner, kind)).copied().unwrap_or(0)
    }

    /// Every accepted credit call, in order.
    pub fn credits(&self) -> Vec<(OwnerId, ResourceKind, u64)> {
        self.book().credits.clone()
    }

    /// Put a production lock in place.
    pub fn lock_production(&self, owner: OwnerId, kind: ResourceKind) {
        self.book().locks.insert((owner, kind));
    }

    pub fn is_production_locked(&self, owner: OwnerId, kind: ResourceKind) -> bool {
        self.book().locks.contains(&(owner, kind))
    }

    /// Refuse credits to `owner` from now on.
    pub fn freeze(&self, owner: OwnerId) {
        self.book().frozen.insert(owner);
    }

    /// Make credit calls fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.book().failing = failing;
    }
}

impl ResourceLedger for InMemoryLedger {
    fn credit(
        &self,
        owner: OwnerId,
        kind: ResourceKind,
        amount: u64,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send {
        let result = {
            let mut book = self.book();
            if book.failing {
                Err(LedgerError::Unavailable("ledger offline".to_string()))
            } else if book.frozen.contains(&owner) {
                Err(LedgerError::Rejected {
                    owner,
                    reason: "account frozen".to_string(),
                })
            } else {
                *book.balances.entry((owner, kind)).or_insert(0) += amount;
                book.credits.push((owner, kind, amount));
                Ok(())
            }
        };
        std::future::ready(result)
    }

    fn release_production_lock(
        &self,
        owner: OwnerId,
        kind: ResourceKind,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send {
        self.book().locks.remove(&(owner, kind));
        std::future::ready(Ok(()))
    }
}

// ============================================================================
// Static Collection
// ============================================================================

/// Fixed snapshots per owner; unknown owners own nothing.
#[derive(Debug, Default)]
pub struct StaticCollection {
    snapshots: HashMap<OwnerId, CollectionSnapshot>,
    unavailable: HashSet<OwnerId>,
}

impl StaticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner: OwnerId, snapshot: CollectionSnapshot) -> Self {
        self.snapshots.insert(owner, snapshot);
        self
    }

    /// Lookups for `owner` fail.
    pub fn with_unavailable(mut self, owner: OwnerId) -> Self {
        self.unavailable.insert(owner);
        self
    }
}

impl CollectionSource for StaticCollection {
    fn snapshot(
        &self,
        owner: OwnerId,
    ) -> impl Future<Output = Result<CollectionSnapshot, CollectionError>> + Send {
        let result = if self.unavailable.contains(&owner) {
            Err(CollectionError::Lookup {
                owner,
                reason: "collection service unavailable".to_string(),
            })
        } else {
            Ok(self.snapshots.get(&owner).cloned().unwrap_or_default())
        };
        std::future::ready(result)
    }
}

// ============================================================================
// Activity Gates
// ============================================================================

/// Every activity is always ready.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

impl ActivityGate for AlwaysReady {
    fn check_ready(
        &self,
        _owner: OwnerId,
        _variant: Variant,
    ) -> impl Future<Output = Result<(), NotReady>> + Send {
        std::future::ready(Ok(()))
    }
}

/// Owners whose activity is busy are refused.
#[derive(Debug, Default)]
pub struct BusyOwners {
    busy: Mutex<HashMap<OwnerId, String>>,
}

impl BusyOwners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_busy(&self, owner: OwnerId, reason: &str) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner, reason.to_string());
    }

    pub fn clear(&self, owner: OwnerId) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&owner);
    }
}

impl ActivityGate for BusyOwners {
    fn check_ready(
        &self,
        owner: OwnerId,
        _variant: Variant,
    ) -> impl Future<Output = Result<(), NotReady>> + Send {
        let result = match self
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&owner)
        {
            Some(reason) => Err(NotReady(reason.clone())),
            None => Ok(()),
        };
        std::future::ready(result)
    }
}

// ============================================================================
// Channel Sink
// ============================================================================

/// Messages delivered to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Frame(BoardFrameProto),
    Ended(SessionEndedProto),
}

/// Sink forwarding wire messages over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RenderSink for ChannelSink {
    fn present(&self, owner: OwnerId, frame: &BoardFrame) -> Result<(), RenderError> {
        self.tx
            .send(SinkEvent::Frame(BoardFrameProto::from_frame(owner, frame)))
            .map_err(|_| RenderError::Closed)
    }

    fn session_ended(&self, summary: &SessionSummary) -> Result<(), RenderError> {
        self.tx
            .send(SinkEvent::Ended(summary.into()))
            .map_err(|_| RenderError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_sim::{GameState, Spawner, VariantParams, render};

    #[tokio::test]
    async fn test_ledger_credits_and_locks() {
        let ledger = InMemoryLedger::new();
        ledger.credit(1, ResourceKind::Coins, 30).await.unwrap();
        ledger.credit(1, ResourceKind::Coins, 5).await.unwrap();
        assert_eq!(ledger.balance(1, ResourceKind::Coins), 35);
        assert_eq!(ledger.balance(1, ResourceKind::Gems), 0);
        assert_eq!(ledger.credits().len(), 2);

        ledger.lock_production(1, ResourceKind::Fuel);
        assert!(ledger.is_production_locked(1, ResourceKind::Fuel));
        ledger.release_production_lock(1, ResourceKind::Fuel).await.unwrap();
        assert!(!ledger.is_production_locked(1, ResourceKind::Fuel));
    }

    #[tokio::test]
    async fn test_failing_ledger_credits_nothing() {
        let ledger = InMemoryLedger::new();
        ledger.set_failing(true);
        assert!(ledger.credit(1, ResourceKind::Gems, 3).await.is_err());
        assert_eq!(ledger.balance(1, ResourceKind::Gems), 0);
        assert!(ledger.credits().is_empty());
    }

    #[tokio::test]
    async fn test_frozen_owner_rejected() {
        let ledger = InMemoryLedger::new();
        ledger.freeze(2);
        assert_eq!(
            ledger.credit(2, ResourceKind::Coins, 10).await,
            Err(LedgerError::Rejected {
                owner: 2,
                reason: "account frozen".to_string()
            })
        );
        ledger.credit(3, ResourceKind::Coins, 10).await.unwrap();
        assert_eq!(ledger.credits(), vec![(3, ResourceKind::Coins, 10)]);
    }

    #[tokio::test]
    async fn test_unavailable_collection_lookup() {
        let collection = StaticCollection::new()
            .with_owner(1, CollectionSnapshot::default().with_count(ResourceKind::Gems, 12))
            .with_unavailable(2);
        assert_eq!(
            collection.snapshot(1).await.unwrap().counts[&ResourceKind::Gems],
            12
        );
        assert!(matches!(
            collection.snapshot(2).await,
            Err(CollectionError::Lookup { owner: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_busy_owner_gate() {
        let gate = BusyOwners::new();
        gate.mark_busy(4, "harvest in progress");
        assert_eq!(
            gate.check_ready(4, Variant::ScrollRunner).await,
            Err(NotReady("harvest in progress".to_string()))
        );
        assert!(gate.check_ready(5, Variant::ScrollRunner).await.is_ok());
        gate.clear(4);
        assert!(gate.check_ready(4, Variant::ScrollRunner).await.is_ok());
    }

    #[test]
    fn test_channel_sink_reports_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        let state = GameState::new(
            VariantParams::default_for(Variant::FallingCollector),
            Spawner::scripted([]),
        )
        .unwrap();
        let frame = render(&state);

        sink.present(8, &frame).unwrap();
        drop(rx);
        assert_eq!(sink.present(8, &frame), Err(RenderError::Closed));
    }
}
