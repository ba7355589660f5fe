//! ScrollRunner: obstacles and pickups scroll in from the right edge while
//! the runner switches lanes in a fixed column.

use crate::{
    Action, Coord, Fnv1a64, GameEvent, Progress, SimError, Spawner, chance, dimension, invalid, whole,
};

/// Difficulty parameters for the scroll runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerParams {
    /// Visible columns.
    pub width: u32,
    pub lanes: u32,
    pub score_cap: u32,
    pub duration_ticks: u64,
    pub obstacle_chance: f64,
    pub pickup_chance: f64,
    /// Column the runner occupies.
    pub runner_column: u32,
}

impl Default for RunnerParams {
    fn default() -> Self {
        Self {
            width: 10,
            lanes: 3,
            score_cap: 25,
            duration_ticks: 150,
            obstacle_chance: 0.3,
            pickup_chance: 0.25,
            runner_column: 1,
        }
    }
}

impl RunnerParams {
    pub(crate) fn tuning(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("width", f64::from(self.width)),
            ("lanes", f64::from(self.lanes)),
            ("score_cap", f64::from(self.score_cap)),
            ("duration_ticks", self.duration_ticks as f64),
            ("obstacle_chance", self.obstacle_chance),
            ("pickup_chance", self.pickup_chance),
            ("runner_column", f64::from(self.runner_column)),
        ]
    }

    pub(crate) fn set(&mut self, key: &str, value: f64) -> Result<(), SimError> {
        match key {
            "width" => self.width = whole(key, value)? as u32,
            "lanes" => self.lanes = whole(key, value)? as u32,
            "score_cap" => self.score_cap = whole(key, value)? as u32,
            "duration_ticks" => self.duration_ticks = whole(key, value)?,
            "obstacle_chance" => self.obstacle_chance = chance(key, value)?,
            "pickup_chance" => self.pickup_chance = chance(key, value)?,
            "runner_column" => self.runner_column = whole(key, value)? as u32,
            _ => return Err(SimError::UnknownParameter(key.to_string())),
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), SimError> {
        dimension("width", self.width, 2)?;
        dimension("lanes", self.lanes, 1)?;
        if self.runner_column >= self.width - 1 {
            return Err(invalid(
                "runner_column",
                "must leave at least one column to its right",
            ));
        }
        Ok(())
    }
}

/// What occupies a scrolling cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Obstacle,
    Pickup,
}

/// Board of the scroll runner.
#[derive(Debug, Clone)]
pub struct RunnerBoard {
    width: i32,
    lanes: i32,
    runner: Coord,
    entities: Vec<(Coord, EntityKind)>,
    obstacle_chance: f64,
    pickup_chance: f64,
}

impl RunnerBoard {
    pub const AFFORDANCES: &'static [Action] = &[Action::Up, Action::Down];

    pub(crate) fn new(params: &RunnerParams) -> Self {
        let lanes = params.lanes as i32;
        Self {
            width: params.width as i32,
            lanes,
            runner: Coord::new(params.runner_column as i32, lanes / 2),
            entities: Vec::new(),
            obstacle_chance: params.obstacle_chance,
            pickup_chance: params.pickup_chance,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn lanes(&self) -> i32 {
        self.lanes
    }

    pub fn runner(&self) -> Coord {
        self.runner
    }

    pub fn entities(&self) -> &[(Coord, EntityKind)] {
        &self.entities
    }

    pub(crate) fn advance(
        &mut self,
        progress: &mut Progress,
        spawner: &mut Spawner,
        events: &mut Vec<GameEvent>,
    ) {
        let scrolling = std::mem::take(&mut self.entities);
        for (at, kind) in scrolling {
            let next = Coord::new(at.x - 1, at.y);
            if next.x < 0 {
                continue;
            }
            if next == self.runner {
                match kind {
                    EntityKind::Obstacle => {
                        progress.collide(next, events);
                        self.entities.push((next, kind));
                    }
                    EntityKind::Pickup => progress.collect(next, events),
                }
                continue;
            }
            self.entities.push((next, kind));
        }

        if progress.fatal {
            return;
        }

        let edge = self.width - 1;
        if let Some(lane) = spawner.draw(self.obstacle_chance, self.lanes as u32) {
            self.entities
                .push((Coord::new(edge, lane as i32), EntityKind::Obstacle));
        }
        if let Some(lane) = spawner.draw(self.pickup_chance, self.lanes as u32) {
            let at = Coord::new(edge, lane as i32);
            if !self.entities.iter().any(|(c, _)| *c == at) {
                self.entities.push((at, EntityKind::Pickup));
            }
        }
    }

    pub(crate) fn apply(
        &mut self,
        action: Action,
        progress: &mut Progress,
        events: &mut Vec<GameEvent>,
    ) {
        let delta = match action {
            Action::Up => -1,
            Action::Down => 1,
            Action::Left | Action::Right | Action::DashLeft | Action::DashRight => {
                events.push(GameEvent::InputIgnored { action });
                return;
            }
        };

        self.runner.y = (self.runner.y + delta).clamp(0, self.lanes - 1);

        let runner = self.runner;
        let Some(index) = self.entities.iter().position(|(c, _)| *c == runner) else {
            return;
        };
        match self.entities[index].1 {
            EntityKind::Obstacle => progress.collide(runner, events),
            EntityKind::Pickup => {
                self.entities.remove(index);
                progress.collect(runner, events);
            }
        }
    }

    pub(crate) fn digest(&self, hasher: &mut Fnv1a64) {
        hasher.update(&self.width.to_le_bytes());
        hasher.update(&self.lanes.to_le_bytes());
        hasher.coord(self.runner);
        hasher.update(&(self.entities.len() as u64).to_le_bytes());
        for (at, kind) in &self.entities {
            hasher.coord(*at);
            hasher.update(&[match kind {
                EntityKind::Obstacle => 1,
                EntityKind::Pickup => 2,
            }]);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Board, GameState, TerminalReason, VariantParams};

    use super::*;

    fn runner(state: &GameState) -> &RunnerBoard {
        match state.board() {
            Board::Runner(b) => b,
            other => panic!("expected runner board, got {other:?}"),
        }
    }

    fn new_state(plan: Vec<Option<u32>>) -> GameState {
        GameState::new(
            VariantParams::Runner(RunnerParams::default()),
            Spawner::scripted(plan),
        )
        .unwrap()
    }

    #[test]
    fn test_runner_starts_in_middle_lane() {
        let state = new_state(vec![]);
        assert_eq!(runner(&state).runner(), Coord::new(1, 1));
    }

    #[test]
    fn test_lane_changes_clamp() {
        let mut state = new_state(vec![]);
        for _ in 0..5 {
            state.apply_input(Action::Up).unwrap();
        }
        assert_eq!(runner(&state).runner().y, 0);
        for _ in 0..5 {
            state.apply_input(Action::Down).unwrap();
        }
        assert_eq!(runner(&state).runner().y, 2);
    }

    #[test]
    fn test_horizontal_input_ignored() {
        let mut state = new_state(vec![]);
        let digest = state.state_digest();
        let events = state.apply_input(Action::Right).unwrap();
        assert_eq!(
            events,
            vec![GameEvent::InputIgnored {
                action: Action::Right
            }]
        );
        assert_eq!(state.state_digest(), digest);
    }

    #[test]
    fn test_entities_scroll_off_left_edge() {
        // Obstacle in lane 0 (runner is in lane 1), no pickup.
        let mut state = new_state(vec![Some(0), None]);
        state.tick().unwrap();
        assert_eq!(
            runner(&state).entities(),
            &[(Coord::new(9, 0), EntityKind::Obstacle)]
        );
        for _ in 0..9 {
            state.tick().unwrap();
        }
        assert_eq!(
            runner(&state).entities(),
            &[(Coord::new(0, 0), EntityKind::Obstacle)]
        );
        state.tick().unwrap();
        assert!(runner(&state).entities().is_empty());
        assert_eq!(state.terminal(), None);
    }

    #[test]
    fn test_pickup_in_runner_lane_scores() {
        let mut state = new_state(vec![None, Some(1)]);
        // Spawned at column 9, reaches column 1 after eight more ticks.
        for _ in 0..9 {
            state.tick().unwrap();
        }
        assert_eq!(state.score(), 1);
        assert!(runner(&state).entities().is_empty());
    }

    #[test]
    fn test_obstacle_in_runner_lane_is_fatal() {
        let mut state = new_state(vec![Some(1), None]);
        for _ in 0..9 {
            state.tick().unwrap();
        }
        assert_eq!(state.terminal(), Some(TerminalReason::FatalCollision));
        assert_eq!(state.score(), 0);
    }

    #[test]
    fn test_dodging_avoids_obstacle() {
        let mut state = new_state(vec![Some(1), None]);
        for _ in 0..8 {
            state.tick().unwrap();
        }
        state.apply_input(Action::Up).unwrap();
        state.tick().unwrap();
        assert_eq!(state.terminal(), None);
    }

    #[test]
    fn test_switching_into_obstacle_is_fatal() {
        let mut state = new_state(vec![Some(0), None]);
        for _ in 0..9 {
            state.tick().unwrap();
        }
        // Obstacle now beside the runner in lane 0.
        let events = state.apply_input(Action::Up).unwrap();
        assert!(events.contains(&GameEvent::Collision {
            at: Coord::new(1, 0)
        }));
        assert_eq!(state.terminal(), Some(TerminalReason::FatalCollision));
    }

    #[test]
    fn test_pickup_not_stacked_on_obstacle() {
        let mut state = new_state(vec![Some(2), Some(2)]);
        state.tick().unwrap();
        assert_eq!(runner(&state).entities().len(), 1);
    }
}
