//! Session Registry: at most one live session per owner.
//!
//! Read access is public. Sessions enter and leave only through the engine,
//! so a removed session is always one whose timer has been stopped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arcade_sim::OwnerId;

use crate::error::AlreadyActive;
use crate::session::GameSession;

/// Keyed store of active sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<OwnerId, Arc<GameSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere must not take the key set down with it.
    fn sessions(&self) -> MutexGuard<'_, HashMap<OwnerId, Arc<GameSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session. Never overwrites a live one.
    pub(crate) fn start(&self, session: GameSession) -> Result<Arc<GameSession>, AlreadyActive> {
        let owner = session.owner();
        let mut sessions = self.sessions();
        if sessions.contains_key(&owner) {
            return Err(AlreadyActive(owner));
        }
        let session = Arc::new(session);
        sessions.insert(owner, Arc::clone(&session));
        Ok(session)
    }

    pub fn get(&self, owner: OwnerId) -> Option<Arc<GameSession>> {
        self.sessions().get(&owner).cloned()
    }

    /// Remove `session` if it is still the owner's registered session.
    /// No-op otherwise, so repeated teardowns are harmless.
    pub(crate) fn retire(&self, session: &Arc<GameSession>) -> bool {
        let mut sessions = self.sessions();
        match sessions.get(&session.owner()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(&session.owner());
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Owners with a live session, ascending.
    pub fn owners(&self) -> Vec<OwnerId> {
        let mut owners: Vec<_> = self.sessions().keys().copied().collect();
        owners.sort_unstable();
        owners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonus::BonusTable;
    use crate::config::RewardBindings;
    use arcade_sim::{GameState, Spawner, Variant, VariantParams};

    fn session(owner: OwnerId) -> GameSession {
        let variant = Variant::GridSnakeCollector;
        let game = GameState::new(VariantParams::default_for(variant), Spawner::seeded(owner)).unwrap();
        GameSession::new(
            owner,
            game,
            RewardBindings::default().for_variant(variant),
            BonusTable::default().resolve(&Default::default()),
        )
    }

    #[test]
    fn test_one_session_per_owner() {
        let registry = SessionRegistry::new();
        let first = registry.start(session(1)).unwrap();

        assert_eq!(registry.start(session(1)).unwrap_err(), AlreadyActive(1));
        assert!(Arc::ptr_eq(&registry.get(1).unwrap(), &first));

        registry.start(session(2)).unwrap();
        assert_eq!(registry.owners(), vec![1, 2]);
    }

    #[test]
    fn test_retire_is_idempotent() {
        let registry = SessionRegistry::new();
        let live = registry.start(session(7)).unwrap();

        assert!(registry.retire(&live));
        assert!(!registry.retire(&live));
        assert!(registry.get(7).is_none());
        assert!(registry.is_empty());

        registry.start(session(7)).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_retire_ignores_replaced_session() {
        let registry = SessionRegistry::new();
        let old = registry.start(session(3)).unwrap();
        registry.retire(&old);
        let new = registry.start(session(3)).unwrap();

        assert!(!registry.retire(&old));
        assert!(registry.get(3).is_some());
        assert!(registry.retire(&new));
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn test_concurrent_starts_admit_one() {
        let registry = Arc::new(SessionRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.start(session(42)).is_ok())
            })
            .collect();
        let admitted = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(registry.len(), 1);
    }
}
