//! GridSnakeCollector: a snake on a wrapping grid eats pickups to grow.
//!
//! The snake advances one cell on every tick and on every accepted input.
//! Running into its own body ends the game; the fatal move is not applied.

use std::collections::VecDeque;

use crate::{
    Action, Coord, Fnv1a64, GameEvent, Progress, SimError, Spawner, chance, dimension, invalid, whole,
};

/// Difficulty parameters for the snake collector.
#[derive(Debug, Clone, PartialEq)]
pub struct SnakeParams {
    pub width: u32,
    pub height: u32,
    pub score_cap: u32,
    pub duration_ticks: u64,
    /// Per-tick probability of spawning a pickup while below `max_pickups`.
    pub spawn_chance: f64,
    pub max_pickups: u32,
    pub initial_length: u32,
}

impl Default for SnakeParams {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            score_cap: 20,
            duration_ticks: 200,
            spawn_chance: 0.5,
            max_pickups: 2,
            initial_length: 4,
        }
    }
}

impl SnakeParams {
    pub(crate) fn tuning(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("width", f64::from(self.width)),
            ("height", f64::from(self.height)),
            ("score_cap", f64::from(self.score_cap)),
            ("duration_ticks", self.duration_ticks as f64),
            ("spawn_chance", self.spawn_chance),
            ("max_pickups", f64::from(self.max_pickups)),
            ("initial_length", f64::from(self.initial_length)),
        ]
    }

    pub(crate) fn set(&mut self, key: &str, value: f64) -> Result<(), SimError> {
        match key {
            "width" => self.width = whole(key, value)? as u32,
            "height" => self.height = whole(key, value)? as u32,
            "score_cap" => self.score_cap = whole(key, value)? as u32,
            "duration_ticks" => self.duration_ticks = whole(key, value)?,
            "spawn_chance" => self.spawn_chance = chance(key, value)?,
            "max_pickups" => self.max_pickups = whole(key, value)? as u32,
            "initial_length" => self.initial_length = whole(key, value)? as u32,
            _ => return Err(SimError::UnknownParameter(key.to_string())),
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), SimError> {
        dimension("width", self.width, 3)?;
        dimension("height", self.height, 3)?;
        if self.initial_length == 0 || self.initial_length > self.width {
            return Err(invalid("initial_length", "must be between 1 and width"));
        }
        Ok(())
    }
}

/// Direction the snake's head is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    fn from_action(action: Action) -> Option<Self> {
        match action {
            Action::Up => Some(Self::Up),
            Action::Down => Some(Self::Down),
            Action::Left => Some(Self::Left),
            Action::Right => Some(Self::Right),
            Action::DashLeft | Action::DashRight => None,
        }
    }

    fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Up => 1,
            Self::Down => 2,
            Self::Left => 3,
            Self::Right => 4,
        }
    }
}

/// Board of the snake collector.
#[derive(Debug, Clone)]
pub struct SnakeBoard {
    width: i32,
    height: i32,
    /// Head first.
    body: VecDeque<Coord>,
    heading: Heading,
    pickups: Vec<Coord>,
    spawn_chance: f64,
    max_pickups: usize,
}

impl SnakeBoard {
    pub const AFFORDANCES: &'static [Action] =
        &[Action::Up, Action::Left, Action::Right, Action::Down];

    pub(crate) fn new(params: &SnakeParams) -> Self {
        let width = params.width as i32;
        let height = params.height as i32;
        let head = Coord::new(width / 2, height / 2);
        let body = (0..params.initial_length as i32)
            .map(|i| Coord::new((head.x - i).rem_euclid(width), head.y))
            .collect();

        Self {
            width,
            height,
            body,
            heading: Heading::Right,
            pickups: Vec::new(),
            spawn_chance: params.spawn_chance,
            max_pickups: params.max_pickups as usize,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Snake body, head first.
    pub fn body(&self) -> &VecDeque<Coord> {
        &self.body
    }

    pub fn head(&self) -> Option<Coord> {
        self.body.front().copied()
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn pickups(&self) -> &[Coord] {
        &self.pickups
    }

    pub(crate) fn advance(
        &mut self,
        progress: &mut Progress,
        spawner: &mut Spawner,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), SimError> {
        self.step(progress, events)?;
        if !progress.fatal {
            self.spawn(spawner);
        }
        Ok(())
    }

    pub(crate) fn apply(
        &mut self,
        action: Action,
        progress: &mut Progress,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), SimError> {
        let Some(heading) = Heading::from_action(action) else {
            events.push(GameEvent::InputIgnored { action });
            return Ok(());
        };

        // Reversing straight into the neck is never a legal turn.
        if heading == self.heading.opposite() {
            events.push(GameEvent::InputIgnored { action });
            return Ok(());
        }

        self.heading = heading;
        self.step(progress, events)
    }

    /// Move the head one cell, wrapping at every edge.
    fn step(&mut self, progress: &mut Progress, events: &mut Vec<GameEvent>) -> Result<(), SimError> {
        let head = self
            .body
            .front()
            .copied()
            .ok_or(SimError::Corrupt("snake has no body"))?;

        let (dx, dy) = self.heading.delta();
        let next = Coord::new(
            (head.x + dx).rem_euclid(self.width),
            (head.y + dy).rem_euclid(self.height),
        );

        let eating = self.pickups.contains(&next);
        // The tail vacates its cell this step unless the snake grows.
        let blocking = if eating {
            self.body.len()
        } else {
            self.body.len() - 1
        };
        if self.body.iter().take(blocking).any(|cell| *cell == next) {
            progress.collide(next, events);
            return Ok(());
        }

        self.body.push_front(next);
        if eating {
            self.pickups.retain(|p| *p != next);
            progress.collect(next, events);
        } else {
            self.body.pop_back();
        }
        Ok(())
    }

    fn spawn(&mut self, spawner: &mut Spawner) {
        if self.pickups.len() >= self.max_pickups {
            return;
        }

        let free: Vec<Coord> = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Coord::new(x, y)))
            .filter(|c| !self.body.contains(c) && !self.pickups.contains(c))
            .collect();

        if let Some(index) = spawner.draw(self.spawn_chance, free.len() as u32) {
            self.pickups.push(free[index as usize]);
        }
    }

    pub(crate) fn digest(&self, hasher: &mut Fnv1a64) {
        hasher.update(&self.width.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&[self.heading.tag()]);
        hasher.update(&(self.body.len() as u64).to_le_bytes());
        for cell in &self.body {
            hasher.coord(*cell);
        }
        hasher.update(&(self.pickups.len() as u64).to_le_bytes());
        for pickup in &self.pickups {
            hasher.coord(*pickup);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Board, GameState, TerminalReason, VariantParams};

    use super::*;

    fn snake(state: &GameState) -> &SnakeBoard {
        match state.board() {
            Board::Snake(b) => b,
            other => panic!("expected snake board, got {other:?}"),
        }
    }

    fn new_state(params: SnakeParams, plan: Vec<Option<u32>>) -> GameState {
        GameState::new(VariantParams::Snake(params), Spawner::scripted(plan)).unwrap()
    }

    #[test]
    fn test_initial_body_extends_left_of_head() {
        let state = new_state(SnakeParams::default(), vec![]);
        let body: Vec<_> = snake(&state).body().iter().copied().collect();
        assert_eq!(
            body,
            vec![
                Coord::new(5, 5),
                Coord::new(4, 5),
                Coord::new(3, 5),
                Coord::new(2, 5)
            ]
        );
        assert_eq!(snake(&state).heading(), Heading::Right);
    }

    #[test]
    fn test_tick_moves_forward_without_growing() {
        let mut state = new_state(SnakeParams::default(), vec![]);
        state.tick().unwrap();
        let board = snake(&state);
        assert_eq!(board.head(), Some(Coord::new(6, 5)));
        assert_eq!(board.body().len(), 4);
    }

    #[test]
    fn test_wraps_at_all_edges() {
        let params = SnakeParams {
            initial_length: 1,
            ..SnakeParams::default()
        };
        let mut state = new_state(params, vec![]);

        // Right edge
        for _ in 0..5 {
            state.apply_input(Action::Right).unwrap();
        }
        assert_eq!(snake(&state).head(), Some(Coord::new(0, 5)));

        // Top edge
        for _ in 0..6 {
            state.apply_input(Action::Up).unwrap();
        }
        assert_eq!(snake(&state).head(), Some(Coord::new(0, 9)));

        // Left edge
        state.apply_input(Action::Left).unwrap();
        assert_eq!(snake(&state).head(), Some(Coord::new(9, 9)));

        // Bottom edge
        state.apply_input(Action::Down).unwrap();
        assert_eq!(snake(&state).head(), Some(Coord::new(9, 0)));
    }

    #[test]
    fn test_reverse_input_is_ignored() {
        let mut state = new_state(SnakeParams::default(), vec![]);
        let digest = state.state_digest();

        let events = state.apply_input(Action::Left).unwrap();
        assert_eq!(
            events,
            vec![GameEvent::InputIgnored {
                action: Action::Left
            }]
        );
        assert_eq!(state.state_digest(), digest);
        assert_eq!(state.terminal(), None);
    }

    #[test]
    fn test_dash_is_ignored() {
        let mut state = new_state(SnakeParams::default(), vec![]);
        let digest = state.state_digest();
        state.apply_input(Action::DashRight).unwrap();
        assert_eq!(state.state_digest(), digest);
    }

    #[test]
    fn test_eating_grows_and_scores() {
        // Free cells are enumerated row-major. After the first move the snake
        // covers (3..=6, 5), leaving x in {0, 1, 2, 7, 8, 9} free on row 5
        // at indices 50..=55; index 54 is (8, 5).
        let mut state = new_state(SnakeParams::default(), vec![Some(54)]);
        state.tick().unwrap();
        assert_eq!(snake(&state).pickups(), &[Coord::new(8, 5)]);

        state.tick().unwrap();
        assert_eq!(state.score(), 0);
        let events = state.apply_input(Action::Right).unwrap();
        assert!(events.contains(&GameEvent::PickupCollected {
            at: Coord::new(8, 5)
        }));
        assert_eq!(state.score(), 1);
        assert_eq!(snake(&state).body().len(), 5);
        assert!(snake(&state).pickups().is_empty());
    }

    #[test]
    fn test_moving_into_vacating_tail_is_safe() {
        let mut state = new_state(SnakeParams::default(), vec![]);
        // Square loop with a length-4 body chases its own tail.
        state.apply_input(Action::Up).unwrap();
        state.apply_input(Action::Left).unwrap();
        state.apply_input(Action::Down).unwrap();
        assert_eq!(state.terminal(), None);
        assert_eq!(snake(&state).head(), Some(Coord::new(4, 5)));
    }

    /// Turning back over the previous tick's body is fatal and does not
    /// apply the move.
    #[test]
    fn test_self_collision_is_fatal() {
        let params = SnakeParams {
            initial_length: 5,
            ..SnakeParams::default()
        };
        let mut state = new_state(params, vec![]);
        state.tick().unwrap();
        let before: Vec<_> = snake(&state).body().iter().copied().collect();

        state.apply_input(Action::Up).unwrap();
        state.apply_input(Action::Left).unwrap();
        let score_before = state.score();
        let body_before_fatal: Vec<_> = snake(&state).body().iter().copied().collect();
        let events = state.apply_input(Action::Down).unwrap();

        assert!(events.contains(&GameEvent::Collision {
            at: before[1]
        }));
        assert_eq!(state.terminal(), Some(TerminalReason::FatalCollision));
        assert_eq!(state.score(), score_before);
        let body_after: Vec<_> = snake(&state).body().iter().copied().collect();
        assert_eq!(body_after, body_before_fatal);
    }

    #[test]
    fn test_pickups_capped() {
        let params = SnakeParams {
            max_pickups: 1,
            ..SnakeParams::default()
        };
        let mut state = new_state(params, vec![Some(0), Some(1), Some(2)]);
        state.tick().unwrap();
        state.tick().unwrap();
        assert_eq!(snake(&state).pickups().len(), 1);
    }

    #[test]
    fn test_empty_body_is_corrupt() {
        let mut state = new_state(SnakeParams::default(), vec![]);
        if let Board::Snake(board) = &mut state.board {
            board.body.clear();
        }
        assert_eq!(
            state.tick(),
            Err(SimError::Corrupt("snake has no body"))
        );
    }
}
