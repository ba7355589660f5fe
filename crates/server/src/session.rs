//! Game sessions: one live mini-game bound to one owner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use arcade_replay::{AppliedStep, SessionRecorder};
use arcade_sim::{GameEvent, GameState, OwnerId, SimError, TerminalReason, Variant};
use arcade_wire::{ABORTED, SessionTranscript};

use crate::bonus::{BonusProfile, BonusTier};
use crate::config::RewardBinding;
use crate::guard::MutationGuard;
use crate::scheduler::TickHandle;

/// Session lifecycle status. Moves from `Active` to `Ended` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCause {
    /// The rule set reached a terminal condition.
    Finished(TerminalReason),
    /// A transition failed or panicked; treated as a timeout, never settled.
    Faulted,
    /// Torn down from outside (the gated activity was reconfigured).
    Aborted,
}

impl EndCause {
    /// Reason reported to the player and recorded in transcripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished(reason) => reason.as_str(),
            Self::Faulted => TerminalReason::TimedOut.as_str(),
            Self::Aborted => ABORTED,
        }
    }

    /// Terminal reason as seen by an input caller.
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        match self {
            Self::Finished(reason) => Some(*reason),
            Self::Faulted => Some(TerminalReason::TimedOut),
            Self::Aborted => None,
        }
    }

    pub fn settles(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Recorded outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnd {
    pub cause: EndCause,
    pub score: u32,
}

/// Guarded mutable part of a session.
#[derive(Debug)]
pub struct SessionState {
    pub game: GameState,
    recorder: Option<SessionRecorder>,
}

impl SessionState {
    pub fn new(owner: OwnerId, game: GameState) -> Self {
        let recorder = SessionRecorder::new(owner, &game);
        Self {
            game,
            recorder: Some(recorder),
        }
    }

    /// Apply one step to the game and record it.
    pub fn apply(&mut self, step: AppliedStep) -> Result<Vec<GameEvent>, SimError> {
        let at = self.game.elapsed();
        let events = match step {
            AppliedStep::Tick => self.game.tick()?,
            AppliedStep::Input(action) => self.game.apply_input(action)?,
        };
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(step, at);
        }
        Ok(events)
    }

    /// Steps recorded so far.
    pub fn recorded_steps(&self) -> usize {
        self.recorder.as_ref().map_or(0, SessionRecorder::len)
    }

    /// Finalize the transcript. Yields it once.
    pub fn take_transcript(&mut self, cause: EndCause) -> Option<SessionTranscript> {
        self.recorder
            .take()
            .map(|recorder| recorder.finalize(&self.game, cause.as_str()))
    }
}

/// One active mini-game.
#[derive(Debug)]
pub struct GameSession {
    owner: OwnerId,
    variant: Variant,
    binding: RewardBinding,
    bonus: BonusProfile,
    state: MutationGuard<SessionState>,
    end: OnceLock<SessionEnd>,
    reward_settled: AtomicBool,
    ticker: Mutex<Option<TickHandle>>,
}

impl GameSession {
    pub fn new(owner: OwnerId, game: GameState, binding: RewardBinding, bonus: BonusProfile) -> Self {
        Self {
            owner,
            variant: game.variant(),
            binding,
            bonus,
            state: MutationGuard::new(SessionState::new(owner, game)),
            end: OnceLock::new(),
            reward_settled: AtomicBool::new(false),
            ticker: Mutex::new(None),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn binding(&self) -> RewardBinding {
        self.binding
    }

    /// Bonus tier captured at creation for this session's resource kind.
    pub fn bonus(&self) -> BonusTier {
        self.bonus.for_kind(self.binding.kind)
    }

    pub fn state(&self) -> &MutationGuard<SessionState> {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        if self.end.get().is_some() {
            SessionStatus::Ended
        } else {
            SessionStatus::Active
        }
    }

    pub fn is_ended(&self) -> bool {
        self.status() == SessionStatus::Ended
    }

    pub fn end(&self) -> Option<SessionEnd> {
        self.end.get().copied()
    }

    /// Move to `Ended`. Only the first caller wins.
    pub fn mark_ended(&self, cause: EndCause, score: u32) -> bool {
        self.end.set(SessionEnd { cause, score }).is_ok()
    }

    /// Claim the one-time right to settle the reward.
    pub(crate) fn claim_settlement(&self) -> bool {
        self.reward_settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn reward_settled(&self) -> bool {
        self.reward_settled.load(Ordering::Acquire)
    }

    /// Store the timer handle. Refuses a second timer.
    pub(crate) fn attach_ticker(&self, handle: TickHandle) -> Result<(), TickHandle> {
        let mut slot = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(handle);
        }
        *slot = Some(handle);
        Ok(())
    }

    pub(crate) fn detach_ticker(&self) -> Option<TickHandle> {
        self.ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonus::BonusTable;
    use crate::config::RewardBindings;
    use arcade_sim::{Action, Spawner, VariantParams};

    fn session(variant: Variant) -> GameSession {
        let game = GameState::new(VariantParams::default_for(variant), Spawner::seeded(3)).unwrap();
        GameSession::new(
            1,
            game,
            RewardBindings::default().for_variant(variant),
            BonusTable::default().resolve(&Default::default()),
        )
    }

    #[test]
    fn test_status_moves_to_ended_once() {
        let session = session(Variant::FallingCollector);
        assert_eq!(session.status(), SessionStatus::Active);

        assert!(session.mark_ended(EndCause::Finished(TerminalReason::TimedOut), 4));
        assert!(!session.mark_ended(EndCause::Aborted, 0));

        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(
            session.end(),
            Some(SessionEnd {
                cause: EndCause::Finished(TerminalReason::TimedOut),
                score: 4
            })
        );
    }

    #[test]
    fn test_settlement_claimed_once() {
        let session = session(Variant::ScrollRunner);
        assert!(!session.reward_settled());
        assert!(session.claim_settlement());
        assert!(!session.claim_settlement());
        assert!(session.reward_settled());
    }

    #[test]
    fn test_state_records_applied_steps() {
        let session = session(Variant::GridSnakeCollector);
        let mut state = session.state().try_enter().unwrap();
        state.apply(AppliedStep::Tick).unwrap();
        state.apply(AppliedStep::Input(Action::Up)).unwrap();

        let transcript = state
            .take_transcript(EndCause::Aborted)
            .unwrap();
        assert_eq!(transcript.steps.len(), 2);
        assert_eq!(transcript.end_reason, "aborted");
        assert_eq!(transcript.seed, Some(3));
        assert!(state.take_transcript(EndCause::Aborted).is_none());
    }

    #[test]
    fn test_fault_reports_timeout() {
        assert_eq!(EndCause::Faulted.as_str(), "timed_out");
        assert_eq!(
            EndCause::Faulted.terminal_reason(),
            Some(TerminalReason::TimedOut)
        );
        assert!(!EndCause::Faulted.settles());
        assert!(!EndCause::Aborted.settles());
        assert!(EndCause::Finished(TerminalReason::FatalCollision).settles());
    }
}
