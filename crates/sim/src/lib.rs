//! Arcade Simulation Core
//!
//! This crate contains the rule sets for the three mini-game variants run by
//! the session engine:
//! - FallingCollector: catch falling pickups with a catcher on the bottom row
//! - GridSnakeCollector: steer a wrapping snake into pickups
//! - ScrollRunner: switch lanes to dodge obstacles scrolling in from the right
//!
//! Each variant exposes the same contract through [`GameState`]: an initial
//! state built from difficulty parameters, a per-tick transition, an
//! input-applied transition, and a terminal check.
//!
//! # Architecture Constraints
//!
//! The Simulation Core MUST NOT:
//! - Perform I/O operations (file, network, etc.)
//! - Read wall-clock time
//! - Use ambient/unseeded randomness
//!
//! Timers, guards, rendering sinks and reward crediting are owned by the
//! session engine; this crate only transforms state.

#![deny(unsafe_code)]

mod falling;
mod render;
mod runner;
mod snake;
mod spawn;

pub use falling::{FallingBoard, FallingParams};
pub use render::{BoardFrame, render, symbols};
pub use runner::{EntityKind, RunnerBoard, RunnerParams};
pub use snake::{Heading, SnakeBoard, SnakeParams};
pub use spawn::{RNG_ALGORITHM, Spawner};

// ============================================================================
// Type Aliases
// ============================================================================

/// Opaque, stable identifier of the user controlling a session.
pub type OwnerId = u64;

/// A single scheduled simulation step.
pub type Tick = u64;

// ============================================================================
// Core Types
// ============================================================================

/// Integer board coordinate. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The three concrete mini-game rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variant {
    FallingCollector,
    GridSnakeCollector,
    ScrollRunner,
}

impl Variant {
    pub const ALL: [Variant; 3] = [
        Variant::FallingCollector,
        Variant::GridSnakeCollector,
        Variant::ScrollRunner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FallingCollector => "falling_collector",
            Self::GridSnakeCollector => "grid_snake_collector",
            Self::ScrollRunner => "scroll_runner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    fn tag(&self) -> u8 {
        match self {
            Self::FallingCollector => 1,
            Self::GridSnakeCollector => 2,
            Self::ScrollRunner => 3,
        }
    }
}

/// Player input affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Left,
    Right,
    Up,
    Down,
    /// Multi-step move to the left (FallingCollector only).
    DashLeft,
    /// Multi-step move to the right (FallingCollector only).
    DashRight,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Left,
        Action::Right,
        Action::Up,
        Action::Down,
        Action::DashLeft,
        Action::DashRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
            Self::DashLeft => "dash_left",
            Self::DashRight => "dash_right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Left => 1,
            Self::Right => 2,
            Self::Up => 3,
            Self::Down => 4,
            Self::DashLeft => 5,
            Self::DashRight => 6,
        }
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalReason {
    ScoreCapReached,
    TimedOut,
    FatalCollision,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScoreCapReached => "score_cap_reached",
            Self::TimedOut => "timed_out",
            Self::FatalCollision => "fatal_collision",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::ScoreCapReached, Self::TimedOut, Self::FatalCollision]
            .into_iter()
            .find(|r| r.as_str() == s)
    }
}

/// Observable consequence of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    PickupCollected { at: Coord },
    Collision { at: Coord },
    TimeAdvanced { remaining: u64 },
    InputIgnored { action: Action },
}

/// Errors raised by the rule sets.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("game already ended ({})", .0.as_str())]
    Ended(TerminalReason),
    #[error("corrupt board state: {0}")]
    Corrupt(&'static str),
    #[error("invalid tuning parameter `{key}`: {reason}")]
    InvalidParameter { key: String, reason: String },
    #[error("unknown tuning parameter `{0}`")]
    UnknownParameter(String),
}

// ============================================================================
// Difficulty Parameters
// ============================================================================

/// Difficulty parameters for one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantParams {
    Falling(FallingParams),
    Snake(SnakeParams),
    Runner(RunnerParams),
}

impl VariantParams {
    /// Default parameters for a variant.
    pub fn default_for(variant: Variant) -> Self {
        match variant {
            Variant::FallingCollector => Self::Falling(FallingParams::default()),
            Variant::GridSnakeCollector => Self::Snake(SnakeParams::default()),
            Variant::ScrollRunner => Self::Runner(RunnerParams::default()),
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            Self::Falling(_) => Variant::FallingCollector,
            Self::Snake(_) => Variant::GridSnakeCollector,
            Self::Runner(_) => Variant::ScrollRunner,
        }
    }

    pub fn score_cap(&self) -> u32 {
        match self {
            Self::Falling(p) => p.score_cap,
            Self::Snake(p) => p.score_cap,
            Self::Runner(p) => p.score_cap,
        }
    }

    pub fn duration_ticks(&self) -> u64 {
        match self {
            Self::Falling(p) => p.duration_ticks,
            Self::Snake(p) => p.duration_ticks,
            Self::Runner(p) => p.duration_ticks,
        }
    }

    /// Key/value form of the parameters, sorted by key.
    pub fn tuning_parameters(&self) -> Vec<(String, f64)> {
        let mut pairs = match self {
            Self::Falling(p) => p.tuning(),
            Self::Snake(p) => p.tuning(),
            Self::Runner(p) => p.tuning(),
        };
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Rebuild parameters from key/value pairs, starting from the defaults.
    pub fn from_tuning(variant: Variant, pairs: &[(String, f64)]) -> Result<Self, SimError> {
        let mut params = Self::default_for(variant);
        for (key, value) in pairs {
            params.set(key, *value)?;
        }
        params.validate()?;
        Ok(params)
    }

    /// Override a single parameter by key.
    pub fn set(&mut self, key: &str, value: f64) -> Result<(), SimError> {
        match self {
            Self::Falling(p) => p.set(key, value),
            Self::Snake(p) => p.set(key, value),
            Self::Runner(p) => p.set(key, value),
        }
    }

    /// Check cross-field constraints (dimensions, caps, durations).
    pub fn validate(&self) -> Result<(), SimError> {
        if self.score_cap() == 0 {
            return Err(invalid("score_cap", "must be at least 1"));
        }
        if self.duration_ticks() == 0 {
            return Err(invalid("duration_ticks", "must be at least 1"));
        }
        match self {
            Self::Falling(p) => p.validate(),
            Self::Snake(p) => p.validate(),
            Self::Runner(p) => p.validate(),
        }
    }
}

pub(crate) fn invalid(key: &str, reason: &str) -> SimError {
    SimError::InvalidParameter {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Largest board dimension (columns, rows, lanes) any variant accepts.
pub const MAX_BOARD_DIM: u32 = 256;

/// Check a board dimension lies in `min..=MAX_BOARD_DIM`.
pub(crate) fn dimension(key: &str, value: u32, min: u32) -> Result<(), SimError> {
    if value < min || value > MAX_BOARD_DIM {
        return Err(invalid(
            key,
            &format!("must be between {min} and {MAX_BOARD_DIM}"),
        ));
    }
    Ok(())
}

/// Parse a non-negative whole number parameter.
pub(crate) fn whole(key: &str, value: f64) -> Result<u64, SimError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(invalid(key, "expected a non-negative whole number"));
    }
    Ok(value as u64)
}

/// Parse a probability parameter.
pub(crate) fn chance(key: &str, value: f64) -> Result<f64, SimError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(invalid(key, "expected a probability in [0, 1]"));
    }
    Ok(value)
}

// ============================================================================
// StateDigest
// ============================================================================

/// StateDigest algorithm identifier.
pub const STATE_DIGEST_ALGO_ID: &str = "statedigest-v1-fnv1a64-le-board";

/// FNV-1a 64-bit offset basis.
const FNV1A_OFFSET_BASIS: u64 = 0xcbf29ce484222325;

/// FNV-1a 64-bit prime.
const FNV1A_PRIME: u64 = 0x100000001b3;

/// FNV-1a 64-bit hasher for StateDigest computation.
#[derive(Debug, Clone)]
pub(crate) struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    pub(crate) fn new() -> Self {
        Self {
            state: FNV1A_OFFSET_BASIS,
        }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV1A_PRIME);
        }
    }

    pub(crate) fn coord(&mut self, c: Coord) {
        self.update(&c.x.to_le_bytes());
        self.update(&c.y.to_le_bytes());
    }

    pub(crate) fn finish(self) -> u64 {
        self.state
    }
}

// ============================================================================
// Shared Progress
// ============================================================================

/// Score and fatal-collision tracking shared by all variants.
#[derive(Debug, Clone)]
pub(crate) struct Progress {
    pub(crate) score: u32,
    pub(crate) score_cap: u32,
    pub(crate) fatal: bool,
}

impl Progress {
    /// Count one pickup. The score saturates at the cap.
    pub(crate) fn collect(&mut self, at: Coord, events: &mut Vec<GameEvent>) {
        if self.score < self.score_cap {
            self.score += 1;
        }
        events.push(GameEvent::PickupCollected { at });
    }

    pub(crate) fn collide(&mut self, at: Coord, events: &mut Vec<GameEvent>) {
        self.fatal = true;
        events.push(GameEvent::Collision { at });
    }
}

// ============================================================================
// Game State
// ============================================================================

/// Variant-specific board payload.
#[derive(Debug, Clone)]
pub enum Board {
    Falling(FallingBoard),
    Snake(SnakeBoard),
    Runner(RunnerBoard),
}

/// Complete state of one mini-game.
#[derive(Debug, Clone)]
pub struct GameState {
    params: VariantParams,
    board: Board,
    progress: Progress,
    remaining_ticks: u64,
    elapsed: Tick,
    spawner: Spawner,
}

impl GameState {
    /// Build the initial state for the given difficulty parameters.
    pub fn new(params: VariantParams, spawner: Spawner) -> Result<Self, SimError> {
        params.validate()?;

        let board = match &params {
            VariantParams::Falling(p) => Board::Falling(FallingBoard::new(p)),
            VariantParams::Snake(p) => Board::Snake(SnakeBoard::new(p)),
            VariantParams::Runner(p) => Board::Runner(RunnerBoard::new(p)),
        };

        Ok(Self {
            progress: Progress {
                score: 0,
                score_cap: params.score_cap(),
                fatal: false,
            },
            remaining_ticks: params.duration_ticks(),
            elapsed: 0,
            board,
            params,
            spawner,
        })
    }

    pub fn variant(&self) -> Variant {
        self.params.variant()
    }

    pub fn params(&self) -> &VariantParams {
        &self.params
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn score(&self) -> u32 {
        self.progress.score
    }

    pub fn score_cap(&self) -> u32 {
        self.progress.score_cap
    }

    pub fn remaining_ticks(&self) -> u64 {
        self.remaining_ticks
    }

    /// Number of ticks applied so far.
    pub fn elapsed(&self) -> Tick {
        self.elapsed
    }

    /// Seed of the spawn source, if it is replayable.
    pub fn seed(&self) -> Option<u64> {
        self.spawner.seed()
    }

    /// Terminal reason, if the game is over.
    ///
    /// A fatal collision takes precedence over the score cap, which takes
    /// precedence over running out of time.
    pub fn terminal(&self) -> Option<TerminalReason> {
        if self.progress.fatal {
            Some(TerminalReason::FatalCollision)
        } else if self.progress.score >= self.progress.score_cap {
            Some(TerminalReason::ScoreCapReached)
        } else if self.remaining_ticks == 0 {
            Some(TerminalReason::TimedOut)
        } else {
            None
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal().is_some()
    }

    /// Apply one scheduled tick.
    ///
    /// Moves every autonomous element one step, resolves collisions, spawns
    /// at most the variant's per-tick draws, then counts down the clock.
    pub fn tick(&mut self) -> Result<Vec<GameEvent>, SimError> {
        if let Some(reason) = self.terminal() {
            return Err(SimError::Ended(reason));
        }

        let mut events = Vec::new();
        match &mut self.board {
            Board::Falling(b) => b.advance(&mut self.progress, &mut self.spawner, &mut events),
            Board::Snake(b) => b.advance(&mut self.progress, &mut self.spawner, &mut events)?,
            Board::Runner(b) => b.advance(&mut self.progress, &mut self.spawner, &mut events),
        }

        self.elapsed += 1;
        self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
        events.push(GameEvent::TimeAdvanced {
            remaining: self.remaining_ticks,
        });

        Ok(events)
    }

    /// Apply one player action.
    ///
    /// Actions a variant does not understand are reported as
    /// [`GameEvent::InputIgnored`] and leave the state untouched.
    pub fn apply_input(&mut self, action: Action) -> Result<Vec<GameEvent>, SimError> {
        if let Some(reason) = self.terminal() {
            return Err(SimError::Ended(reason));
        }

        let mut events = Vec::new();
        match &mut self.board {
            Board::Falling(b) => b.apply(action, &mut self.progress, &mut events),
            Board::Snake(b) => b.apply(action, &mut self.progress, &mut events)?,
            Board::Runner(b) => b.apply(action, &mut self.progress, &mut events),
        }
        Ok(events)
    }

    /// Input affordances for this variant.
    pub fn affordances(&self) -> &'static [Action] {
        match &self.board {
            Board::Falling(_) => FallingBoard::AFFORDANCES,
            Board::Snake(_) => SnakeBoard::AFFORDANCES,
            Board::Runner(_) => RunnerBoard::AFFORDANCES,
        }
    }

    /// Compute the StateDigest for the current game state.
    ///
    /// The spawn source is not hashed; two states that look identical digest
    /// identically regardless of how their pickups were produced.
    pub fn state_digest(&self) -> u64 {
        let mut hasher = Fnv1a64::new();

        hasher.update(&[self.variant().tag()]);
        hasher.update(&self.elapsed.to_le_bytes());
        hasher.update(&self.remaining_ticks.to_le_bytes());
        hasher.update(&self.progress.score.to_le_bytes());
        hasher.update(&self.progress.score_cap.to_le_bytes());
        hasher.update(&[u8::from(self.progress.fatal)]);

        match &self.board {
            Board::Falling(b) => b.digest(&mut hasher),
            Board::Snake(b) => b.digest(&mut hasher),
            Board::Runner(b) => b.digest(&mut hasher),
        }

        hasher.finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_names_roundtrip() {
        for variant in Variant::ALL {
            assert_eq!(Variant::parse(variant.as_str()), Some(variant));
        }
        assert_eq!(Variant::parse("pinball"), None);
    }

    #[test]
    fn test_action_names_roundtrip() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn test_tuning_parameters_sorted_and_rebuildable() {
        for variant in Variant::ALL {
            let params = VariantParams::default_for(variant);
            let pairs = params.tuning_parameters();
            assert!(pairs.windows(2).all(|w| w[0].0 < w[1].0));

            let rebuilt = VariantParams::from_tuning(variant, &pairs).unwrap();
            assert_eq!(rebuilt, params);
        }
    }

    #[test]
    fn test_from_tuning_rejects_unknown_key() {
        let pairs = vec![("gravity".to_string(), 9.8)];
        let result = VariantParams::from_tuning(Variant::FallingCollector, &pairs);
        assert!(matches!(result, Err(SimError::UnknownParameter(_))));
    }

    #[test]
    fn test_from_tuning_rejects_bad_values() {
        let pairs = vec![("spawn_chance".to_string(), 1.5)];
        let result = VariantParams::from_tuning(Variant::GridSnakeCollector, &pairs);
        assert!(matches!(result, Err(SimError::InvalidParameter { .. })));

        let pairs = vec![("score_cap".to_string(), 0.0)];
        let result = VariantParams::from_tuning(Variant::ScrollRunner, &pairs);
        assert!(matches!(result, Err(SimError::InvalidParameter { .. })));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let cases = [
            (Variant::ScrollRunner, "runner_column", u32::MAX as f64),
            (Variant::ScrollRunner, "lanes", 300.0),
            (Variant::FallingCollector, "width", 2_147_483_648.0),
            (Variant::FallingCollector, "dash_steps", 4_000_000_000.0),
            (Variant::GridSnakeCollector, "height", 257.0),
        ];
        for (variant, key, value) in cases {
            let pairs = vec![(key.to_string(), value)];
            let result = VariantParams::from_tuning(variant, &pairs);
            assert!(
                matches!(&result, Err(SimError::InvalidParameter { key: k, .. }) if k == key),
                "{variant:?} {key}={value}: {result:?}"
            );
        }
    }

    #[test]
    fn test_largest_board_is_playable() {
        let max = f64::from(MAX_BOARD_DIM);
        let pairs = vec![("width".to_string(), max), ("height".to_string(), max)];
        let params = VariantParams::from_tuning(Variant::FallingCollector, &pairs).unwrap();
        let mut state = GameState::new(params, Spawner::seeded(5)).unwrap();
        state.apply_input(Action::DashLeft).unwrap();
        state.tick().unwrap();
        assert_eq!(render(&state).rows.len(), MAX_BOARD_DIM as usize);

        let pairs = vec![("width".to_string(), 10.0), ("runner_column".to_string(), 9.0)];
        let result = VariantParams::from_tuning(Variant::ScrollRunner, &pairs);
        assert!(matches!(result, Err(SimError::InvalidParameter { .. })));
    }

    #[test]
    fn test_initial_state() {
        for variant in Variant::ALL {
            let params = VariantParams::default_for(variant);
            let duration = params.duration_ticks();
            let state = GameState::new(params, Spawner::seeded(1)).unwrap();
            assert_eq!(state.variant(), variant);
            assert_eq!(state.score(), 0);
            assert_eq!(state.elapsed(), 0);
            assert_eq!(state.remaining_ticks(), duration);
            assert_eq!(state.terminal(), None);
            assert_eq!(state.seed(), Some(1));
        }
    }

    #[test]
    fn test_times_out_after_duration() {
        let mut params = VariantParams::default_for(Variant::FallingCollector);
        params.set("duration_ticks", 3.0).unwrap();
        let mut state = GameState::new(params, Spawner::scripted([])).unwrap();

        for _ in 0..3 {
            assert!(state.terminal().is_none());
            state.tick().unwrap();
        }
        assert_eq!(state.terminal(), Some(TerminalReason::TimedOut));
        assert_eq!(state.elapsed(), 3);
    }

    #[test]
    fn test_transitions_after_terminal_are_rejected() {
        let mut params = VariantParams::default_for(Variant::ScrollRunner);
        params.set("duration_ticks", 1.0).unwrap();
        let mut state = GameState::new(params, Spawner::scripted([])).unwrap();
        state.tick().unwrap();

        let digest = state.state_digest();
        assert_eq!(
            state.tick(),
            Err(SimError::Ended(TerminalReason::TimedOut))
        );
        assert_eq!(
            state.apply_input(Action::Up),
            Err(SimError::Ended(TerminalReason::TimedOut))
        );
        assert_eq!(state.state_digest(), digest);
    }

    #[test]
    fn test_tick_reports_time_advanced() {
        let state_params = VariantParams::default_for(Variant::GridSnakeCollector);
        let duration = state_params.duration_ticks();
        let mut state = GameState::new(state_params, Spawner::scripted([])).unwrap();
        let events = state.tick().unwrap();
        assert_eq!(
            events.last(),
            Some(&GameEvent::TimeAdvanced {
                remaining: duration - 1
            })
        );
    }

    #[test]
    fn test_digest_tracks_state() {
        let make = || {
            GameState::new(
                VariantParams::default_for(Variant::FallingCollector),
                Spawner::seeded(5),
            )
            .unwrap()
        };
        let mut a = make();
        let mut b = make();
        assert_eq!(a.state_digest(), b.state_digest());

        a.apply_input(Action::Left).unwrap();
        assert_ne!(a.state_digest(), b.state_digest());

        b.apply_input(Action::Left).unwrap();
        assert_eq!(a.state_digest(), b.state_digest());

        a.tick().unwrap();
        b.tick().unwrap();
        assert_eq!(a.state_digest(), b.state_digest());
    }

    #[test]
    fn test_score_saturates_at_cap() {
        let mut progress = Progress {
            score: 0,
            score_cap: 2,
            fatal: false,
        };
        let mut events = Vec::new();
        for _ in 0..5 {
            progress.collect(Coord::new(0, 0), &mut events);
        }
        assert_eq!(progress.score, 2);
        assert_eq!(events.len(), 5);
    }
}
