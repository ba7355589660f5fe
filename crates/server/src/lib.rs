//! Arcade Session Engine
//!
//! Runs short-lived, per-owner mini-games inside a turn-based chat front
//! end. It owns:
//! - The Session Registry (one live session per owner)
//! - The Concurrency Guard (one mutation at a time per session)
//! - The Tick Scheduler (one timer per session)
//! - Input handling, reward settlement and session transcripts
//!
//! # Architecture
//!
//! A background timer and the player's input events are independent
//! producers mutating the same session. Both go through the same
//! [`MutationGuard`]: whoever enters first applies its transition, renders,
//! and leaves; the other is dropped, not queued. The rule sets themselves
//! live in `arcade-sim` and never see timers, guards or collaborators.
//!
//! Terminal path, from whichever producer detects it:
//! mark ended (guard held) → release guard → settle → remove from registry
//! → stop timer → announce → write transcript.

#![deny(unsafe_code)]

pub mod bonus;
pub mod config;
pub mod error;
pub mod external;
pub mod guard;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod settlement;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use arcade_replay::{AppliedStep, transcript_path, write_transcript};
use arcade_sim::{
    Action, BoardFrame, GameState, OwnerId, SimError, Spawner, TerminalReason, Variant, render,
};
use arcade_wire::{ActionEventProto, SessionTranscript, WireError};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, warn};

pub use bonus::{BonusProfile, BonusTable, BonusTier, CollectionSnapshot, ResourceKind};
pub use config::{EngineConfig, RewardBinding, RewardBindings};
pub use external::{
    ActivityGate, AlwaysReady, BusyOwners, ChannelSink, CollectionSource, InMemoryLedger,
    RenderSink, ResourceLedger, SessionSummary, SinkEvent, StaticCollection,
};
pub use guard::MutationGuard;
pub use registry::SessionRegistry;
pub use scheduler::{TickFlow, TickScheduler};
pub use session::{EndCause, GameSession, SessionStatus};
pub use settlement::{RewardReceipt, settle};

// ============================================================================
// Outcomes
// ============================================================================

/// Answer to a session-start request.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// Session created; the first frame to present.
    Started(BoardFrame),
    /// The owner already has a live session.
    AlreadyActive,
    /// A collaborator-owned precondition failed.
    Rejected(String),
}

/// Result of an input event. None of these are errors for the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// The input was applied and the board re-rendered.
    Applied,
    /// The input ended the session.
    Ended(TerminalReason),
    /// Dropped: another mutation held the guard.
    DroppedBusy,
    /// Dropped: no live session for the owner.
    DroppedStale,
}

/// Result of one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Advanced,
    /// Skipped: an input held the guard.
    Skipped,
    Ended(EndCause),
    /// No live session to tick.
    Gone,
}

enum StepOutcome {
    Continued,
    Busy,
    Stale,
    Ended(EndCause),
}

/// Everything teardown needs, captured while the guard was held.
struct Teardown {
    cause: EndCause,
    score: u32,
    frame: Option<BoardFrame>,
    transcript: Option<SessionTranscript>,
}

// ============================================================================
// Session Engine
// ============================================================================

struct EngineInner<L, C, S, G> {
    config: EngineConfig,
    registry: SessionRegistry,
    scheduler: Option<TickScheduler>,
    seeds: Mutex<ChaCha8Rng>,
    ledger: L,
    collection: C,
    sink: S,
    gate: G,
}

/// Session engine handle. Cheap to clone; clones share all state.
pub struct SessionEngine<L, C, S, G> {
    inner: Arc<EngineInner<L, C, S, G>>,
}

impl<L, C, S, G> Clone for SessionEngine<L, C, S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, C, S, G> SessionEngine<L, C, S, G>
where
    L: ResourceLedger,
    C: CollectionSource,
    S: RenderSink,
    G: ActivityGate,
{
    pub fn new(config: EngineConfig, ledger: L, collection: C, sink: S, gate: G) -> Self {
        let seeds = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        };
        Self {
            inner: Arc::new(EngineInner {
                scheduler: config.tick_period().map(TickScheduler::new),
                registry: SessionRegistry::new(),
                seeds: Mutex::new(seeds),
                config,
                ledger,
                collection,
                sink,
                gate,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn ledger(&self) -> &L {
        &self.inner.ledger
    }

    pub fn sink(&self) -> &S {
        &self.inner.sink
    }

    pub fn gate(&self) -> &G {
        &self.inner.gate
    }

    pub fn session(&self, owner: OwnerId) -> Option<Arc<GameSession>> {
        self.inner.registry.get(owner)
    }

    fn next_seed(&self) -> u64 {
        self.inner
            .seeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_u64()
    }

    // ------------------------------------------------------------------------
    // Session start
    // ------------------------------------------------------------------------

    /// Start a session with a fresh spawn seed.
    pub async fn request_session(&self, owner: OwnerId, variant: Variant) -> StartOutcome {
        let seed = self.next_seed();
        self.request_session_with(owner, variant, Spawner::seeded(seed))
            .await
    }

    /// Start a session with an explicit spawn source.
    pub async fn request_session_with(
        &self,
        owner: OwnerId,
        variant: Variant,
        spawner: Spawner,
    ) -> StartOutcome {
        let inner = &self.inner;
        if inner.registry.get(owner).is_some() {
            debug!(owner, "session.already_active");
            return StartOutcome::AlreadyActive;
        }

        if let Err(not_ready) = inner.gate.check_ready(owner, variant).await {
            info!(owner, variant = variant.as_str(), reason = %not_ready, "session.rejected");
            return StartOutcome::Rejected(not_ready.0);
        }

        let snapshot = match inner.collection.snapshot(owner).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(owner, error = %err, "session.collection_lookup_failed");
                CollectionSnapshot::default()
            }
        };
        let bonus = inner.config.bonus.resolve(&snapshot);

        let game = match GameState::new(inner.config.params_for(variant), spawner) {
            Ok(game) => game,
            Err(err) => {
                warn!(owner, variant = variant.as_str(), error = %err, "session.invalid_parameters");
                return StartOutcome::Rejected(err.to_string());
            }
        };
        let frame = render(&game);
        let seed = game.seed();

        let binding = inner.config.bindings.for_variant(variant);
        let session = match inner
            .registry
            .start(GameSession::new(owner, game, binding, bonus))
        {
            Ok(session) => session,
            Err(_) => {
                debug!(owner, "session.already_active");
                return StartOutcome::AlreadyActive;
            }
        };

        self.start_ticking(&session);

        let tier = session.bonus();
        info!(
            owner,
            variant = variant.as_str(),
            seed = ?seed,
            multiplier = tier.multiplier,
            cap = tier.cap,
            "session.started"
        );
        StartOutcome::Started(frame)
    }

    fn start_ticking(&self, session: &Arc<GameSession>) {
        let Some(scheduler) = self.inner.scheduler else {
            return;
        };
        let engine = self.clone();
        let ticking = Arc::clone(session);
        scheduler.start_ticking(session, move || {
            let engine = engine.clone();
            let session = Arc::clone(&ticking);
            async move {
                match engine.tick_session(&session).await {
                    TickOutcome::Advanced | TickOutcome::Skipped => TickFlow::Continue,
                    TickOutcome::Ended(_) | TickOutcome::Gone => TickFlow::Stop,
                }
            }
        });

        // Lost a race with an abort: the teardown may have run before the
        // timer was attached.
        if session.is_ended() {
            scheduler.stop_ticking(session);
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Apply a player action to the owner's session.
    pub async fn apply_input(&self, owner: OwnerId, action: Action) -> InputOutcome {
        let Some(session) = self.inner.registry.get(owner) else {
            debug!(owner, action = action.as_str(), "session.input_stale");
            return InputOutcome::DroppedStale;
        };
        if session.is_ended() {
            debug!(owner, action = action.as_str(), "session.input_stale");
            return InputOutcome::DroppedStale;
        }

        match self.transition(&session, AppliedStep::Input(action)).await {
            StepOutcome::Continued => InputOutcome::Applied,
            StepOutcome::Busy => {
                debug!(owner, action = action.as_str(), "session.input_dropped");
                InputOutcome::DroppedBusy
            }
            StepOutcome::Stale => InputOutcome::DroppedStale,
            StepOutcome::Ended(cause) => cause
                .terminal_reason()
                .map_or(InputOutcome::DroppedStale, InputOutcome::Ended),
        }
    }

    /// Apply an input event as received from the presentation layer.
    ///
    /// Events naming an unknown action are refused before any session is
    /// looked up.
    pub async fn apply_event(&self, event: ActionEventProto) -> Result<InputOutcome, WireError> {
        let (owner, action): (OwnerId, Action) = event.try_into().inspect_err(|err| {
            debug!(error = %err, "session.input_malformed");
        })?;
        Ok(self.apply_input(owner, action).await)
    }

    /// Run one tick for the owner's session.
    ///
    /// The scheduler calls this on every period; with the scheduler disabled
    /// the caller drives ticks.
    pub async fn run_tick(&self, owner: OwnerId) -> TickOutcome {
        match self.inner.registry.get(owner) {
            Some(session) => self.tick_session(&session).await,
            None => TickOutcome::Gone,
        }
    }

    async fn tick_session(&self, session: &Arc<GameSession>) -> TickOutcome {
        if session.is_ended() {
            return TickOutcome::Gone;
        }
        match self.transition(session, AppliedStep::Tick).await {
            StepOutcome::Continued => TickOutcome::Advanced,
            StepOutcome::Busy => {
                debug!(owner = session.owner(), "tick.skipped_busy");
                TickOutcome::Skipped
            }
            StepOutcome::Stale => TickOutcome::Gone,
            StepOutcome::Ended(cause) => TickOutcome::Ended(cause),
        }
    }

    /// Apply one step under the guard; tear down if it ended the session.
    async fn transition(&self, session: &Arc<GameSession>, step: AppliedStep) -> StepOutcome {
        let owner = session.owner();
        let teardown = {
            let Some(mut state) = session.state().try_enter() else {
                return StepOutcome::Busy;
            };
            if session.is_ended() {
                return StepOutcome::Stale;
            }

            let sink = &self.inner.sink;
            let applied = panic::catch_unwind(AssertUnwindSafe(
                || -> Result<Option<TerminalReason>, SimError> {
                    state.apply(step)?;
                    if let Some(reason) = state.game.terminal() {
                        return Ok(Some(reason));
                    }
                    if let Err(err) = sink.present(owner, &render(&state.game)) {
                        match step {
                            AppliedStep::Tick => warn!(owner, error = %err, "tick.render_failed"),
                            AppliedStep::Input(_) => {
                                warn!(owner, error = %err, "input.render_failed")
                            }
                        }
                    }
                    Ok(None)
                },
            ));

            let cause = match applied {
                Ok(Ok(None)) => return StepOutcome::Continued,
                Ok(Ok(Some(reason))) => EndCause::Finished(reason),
                Ok(Err(err)) => {
                    error!(owner, error = %err, "session.transition_failed");
                    EndCause::Faulted
                }
                Err(payload) => {
                    error!(owner, panic = panic_message(payload.as_ref()), "session.transition_panicked");
                    EndCause::Faulted
                }
            };

            let score = state.game.score();
            if !session.mark_ended(cause, score) {
                return StepOutcome::Stale;
            }
            seal(&mut state, cause, score)
        };

        let cause = teardown.cause;
        self.teardown(session, teardown).await;
        StepOutcome::Ended(cause)
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Tear a session down without settling, e.g. because the activity it
    /// gates was reconfigured. Returns `false` if there was nothing to abort.
    pub async fn abort_session(&self, owner: OwnerId, why: &str) -> bool {
        let Some(session) = self.inner.registry.get(owner) else {
            return false;
        };

        let teardown = {
            let mut state = session.state().enter().await;
            let score = state.game.score();
            if !session.mark_ended(EndCause::Aborted, score) {
                return false;
            }
            seal(&mut state, EndCause::Aborted, score)
        };

        info!(owner, why, "session.aborted");
        self.teardown(&session, teardown).await;
        true
    }

    /// End the owner's session from outside, through the same teardown as
    /// an abort: timer stopped, registry entry removed, end announced, no
    /// settlement. A no-op returning `false` if the owner has no session.
    pub async fn end_session(&self, owner: OwnerId) -> bool {
        self.abort_session(owner, "ended by caller").await
    }

    /// Abort every live session. Returns how many were aborted.
    pub async fn abort_all(&self, why: &str) -> usize {
        let mut aborted = 0;
        for owner in self.inner.registry.owners() {
            if self.abort_session(owner, why).await {
                aborted += 1;
            }
        }
        aborted
    }

    async fn teardown(&self, session: &Arc<GameSession>, teardown: Teardown) {
        let inner = &self.inner;
        let owner = session.owner();

        let receipt = settle(session.as_ref(), &inner.ledger).await;
        inner.registry.retire(session);
        if let Some(scheduler) = inner.scheduler {
            scheduler.stop_ticking(session);
        }

        let amount = receipt.as_ref().map_or(0, |r| r.amount);
        let summary = SessionSummary {
            owner,
            variant: session.variant(),
            reason: teardown.cause.as_str(),
            score: teardown.score,
            frame: teardown.frame,
            receipt,
        };
        if let Err(err) = inner.sink.session_ended(&summary) {
            warn!(owner, error = %err, "session.end_notice_failed");
        }

        if let (Some(dir), Some(transcript)) = (&inner.config.transcript_dir, teardown.transcript) {
            let path = transcript_path(dir, &transcript);
            match write_transcript(&transcript, &path) {
                Ok(()) => debug!(owner, path = %path.display(), "transcript.written"),
                Err(err) => warn!(owner, error = %err, "transcript.write_failed"),
            }
        }

        info!(
            owner,
            variant = session.variant().as_str(),
            reason = teardown.cause.as_str(),
            score = teardown.score,
            amount,
            "session.ended"
        );
    }
}

/// Capture the final frame and transcript. The state may be corrupt after a
/// fault, so neither is allowed to take the teardown down with it.
fn seal(state: &mut session::SessionState, cause: EndCause, score: u32) -> Teardown {
    let frame = panic::catch_unwind(AssertUnwindSafe(|| render(&state.game))).ok();
    let transcript = panic::catch_unwind(AssertUnwindSafe(|| state.take_transcript(cause)))
        .ok()
        .flatten();
    Teardown {
        cause,
        score,
        frame,
        transcript,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// ============================================================================
// Tests
// ============================================================================
