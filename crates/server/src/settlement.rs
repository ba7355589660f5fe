//! Reward Settlement: final score → one ledger credit.

use arcade_sim::OwnerId;
use tracing::{info, warn};

use crate::bonus::ResourceKind;
use crate::external::ResourceLedger;
use crate::session::GameSession;

/// Outcome of settling one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardReceipt {
    pub owner: OwnerId,
    pub kind: ResourceKind,
    pub score: u32,
    /// `score × conversion`, before bonus.
    pub base: u64,
    pub multiplier: u32,
    /// `min(base × multiplier, cap)`.
    pub amount: u64,
    /// The ledger accepted the credit.
    pub credited: bool,
    /// A production lock was cleared.
    pub lock_released: bool,
}

/// Reward owed for a score.
pub fn reward_amount(score: u32, conversion: u32, multiplier: u32, cap: u64) -> (u64, u64) {
    let base = u64::from(score) * u64::from(conversion);
    (base, base.saturating_mul(u64::from(multiplier)).min(cap))
}

/// Settle a finished session.
///
/// Returns `None` if the session has not finished, ended without a terminal
/// condition (fault or abort), or was already settled. Ledger failures are
/// logged and recorded on the receipt; there is no retry.
pub async fn settle<L: ResourceLedger>(session: &GameSession, ledger: &L) -> Option<RewardReceipt> {
    let end = session.end()?;
    if !end.cause.settles() || !session.claim_settlement() {
        return None;
    }

    let owner = session.owner();
    let binding = session.binding();
    let tier = session.bonus();
    let (base, amount) = reward_amount(end.score, binding.conversion, tier.multiplier, tier.cap);

    let credited = if amount == 0 {
        false
    } else {
        match ledger.credit(owner, binding.kind, amount).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    owner,
                    kind = binding.kind.as_str(),
                    amount,
                    error = %err,
                    "settle.ledger_failed"
                );
                false
            }
        }
    };

    let lock_released = if binding.production_locked {
        match ledger.release_production_lock(owner, binding.kind).await {
            Ok(()) => true,
            Err(err) => {
                warn!(owner, kind = binding.kind.as_str(), error = %err, "settle.lock_release_failed");
                false
            }
        }
    } else {
        false
    };

    info!(
        owner,
        kind = binding.kind.as_str(),
        score = end.score,
        multiplier = tier.multiplier,
        amount,
        credited,
        "settle.completed"
    );

    Some(RewardReceipt {
        owner,
        kind: binding.kind,
        score: end.score,
        base,
        multiplier: tier.multiplier,
        amount,
        credited,
        lock_released,
    })
}
