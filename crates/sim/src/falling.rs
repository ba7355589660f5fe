//! FallingCollector: pickups fall one row per tick; the player slides a
//! catcher along the bottom row to collect them.

use crate::{
    Action, Coord, Fnv1a64, GameEvent, Progress, SimError, Spawner, chance, dimension, whole,
};

/// Difficulty parameters for the falling collector.
#[derive(Debug, Clone, PartialEq)]
pub struct FallingParams {
    pub width: u32,
    pub height: u32,
    pub score_cap: u32,
    pub duration_ticks: u64,
    /// Per-tick probability of spawning a pickup in the top row.
    pub spawn_chance: f64,
    /// Columns covered by a dash.
    pub dash_steps: u32,
}

impl Default for FallingParams {
    fn default() -> Self {
        Self {
            width: 12,
            height: 8,
            score_cap: 15,
            duration_ticks: 120,
            spawn_chance: 0.35,
            dash_steps: 2,
        }
    }
}

impl FallingParams {
    pub(crate) fn tuning(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("width", f64::from(self.width)),
            ("height", f64::from(self.height)),
            ("score_cap", f64::from(self.score_cap)),
            ("duration_ticks", self.duration_ticks as f64),
            ("spawn_chance", self.spawn_chance),
            ("dash_steps", f64::from(self.dash_steps)),
        ]
    }

    pub(crate) fn set(&mut self, key: &str, value: f64) -> Result<(), SimError> {
        match key {
            "width" => self.width = whole(key, value)? as u32,
            "height" => self.height = whole(key, value)? as u32,
            "score_cap" => self.score_cap = whole(key, value)? as u32,
            "duration_ticks" => self.duration_ticks = whole(key, value)?,
            "spawn_chance" => self.spawn_chance = chance(key, value)?,
            "dash_steps" => self.dash_steps = whole(key, value)? as u32,
            _ => return Err(SimError::UnknownParameter(key.to_string())),
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), SimError> {
        dimension("width", self.width, 1)?;
        dimension("height", self.height, 2)?;
        dimension("dash_steps", self.dash_steps, 1)?;
        Ok(())
    }
}

/// Board of the falling collector.
#[derive(Debug, Clone)]
pub struct FallingBoard {
    width: i32,
    height: i32,
    catcher_x: i32,
    /// Falling pickups, in spawn order.
    objects: Vec<Coord>,
    spawn_chance: f64,
    dash_steps: i32,
}

impl FallingBoard {
    pub const AFFORDANCES: &'static [Action] = &[
        Action::DashLeft,
        Action::Left,
        Action::Right,
        Action::DashRight,
    ];

    pub(crate) fn new(params: &FallingParams) -> Self {
        let width = params.width as i32;
        Self {
            width,
            height: params.height as i32,
            catcher_x: width / 2,
            objects: Vec::new(),
            spawn_chance: params.spawn_chance,
            dash_steps: params.dash_steps as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Position of the catcher (always on the bottom row).
    pub fn catcher(&self) -> Coord {
        Coord::new(self.catcher_x, self.height - 1)
    }

    pub fn objects(&self) -> &[Coord] {
        &self.objects
    }

    pub(crate) fn advance(
        &mut self,
        progress: &mut Progress,
        spawner: &mut Spawner,
        events: &mut Vec<GameEvent>,
    ) {
        let catcher = self.catcher();
        let falling = std::mem::take(&mut self.objects);

        for object in falling {
            let next = Coord::new(object.x, object.y + 1);
            if next == catcher {
                progress.collect(next, events);
            } else if next.y < self.height {
                self.objects.push(next);
            }
        }

        if let Some(column) = spawner.draw(self.spawn_chance, self.width as u32) {
            self.objects.push(Coord::new(column as i32, 0));
        }
    }

    pub(crate) fn apply(
        &mut self,
        action: Action,
        progress: &mut Progress,
        events: &mut Vec<GameEvent>,
    ) {
        let delta = match action {
            Action::Left => -1,
            Action::Right => 1,
            Action::DashLeft => -self.dash_steps,
            Action::DashRight => self.dash_steps,
            Action::Up | Action::Down => {
                events.push(GameEvent::InputIgnored { action });
                return;
            }
        };

        self.catcher_x = (self.catcher_x + delta).clamp(0, self.width - 1);

        let catcher = self.catcher();
        let (caught, rest): (Vec<Coord>, Vec<Coord>) = std::mem::take(&mut self.objects)
            .into_iter()
            .partition(|object| *object == catcher);
        self.objects = rest;
        for at in caught {
            progress.collect(at, events);
        }
    }

    pub(crate) fn digest(&self, hasher: &mut Fnv1a64) {
        hasher.update(&self.width.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&self.catcher_x.to_le_bytes());
        hasher.update(&(self.objects.len() as u64).to_le_bytes());
        for object in &self.objects {
            hasher.coord(*object);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Board, GameState, TerminalReason, VariantParams};

    use super::*;

    fn falling(state: &GameState) -> &FallingBoard {
        match state.board() {
            Board::Falling(b) => b,
            other => panic!("expected falling board, got {other:?}"),
        }
    }

    fn new_state(params: FallingParams, plan: Vec<Option<u32>>) -> GameState {
        GameState::new(VariantParams::Falling(params), Spawner::scripted(plan)).unwrap()
    }

    #[test]
    fn test_catcher_starts_centred_on_bottom_row() {
        let state = new_state(FallingParams::default(), vec![]);
        assert_eq!(falling(&state).catcher(), Coord::new(6, 7));
    }

    #[test]
    fn test_catcher_clamps_to_edges() {
        let mut state = new_state(FallingParams::default(), vec![]);
        for _ in 0..10 {
            state.apply_input(Action::DashLeft).unwrap();
        }
        assert_eq!(falling(&state).catcher().x, 0);

        for _ in 0..20 {
            state.apply_input(Action::Right).unwrap();
        }
        assert_eq!(falling(&state).catcher().x, 11);
    }

    #[test]
    fn test_vertical_input_ignored() {
        let mut state = new_state(FallingParams::default(), vec![]);
        let digest = state.state_digest();
        let events = state.apply_input(Action::Up).unwrap();
        assert_eq!(
            events,
            vec![GameEvent::InputIgnored { action: Action::Up }]
        );
        assert_eq!(state.state_digest(), digest);
    }

    #[test]
    fn test_pickup_falls_into_catcher() {
        let mut state = new_state(FallingParams::default(), vec![Some(6)]);

        // Spawned in the top row on the first tick.
        state.tick().unwrap();
        assert_eq!(falling(&state).objects(), &[Coord::new(6, 0)]);

        // Six more ticks reach row 6; the seventh enters the catcher row.
        for _ in 0..6 {
            state.tick().unwrap();
        }
        assert_eq!(state.score(), 0);
        let events = state.tick().unwrap();
        assert!(events.contains(&GameEvent::PickupCollected {
            at: Coord::new(6, 7)
        }));
        assert_eq!(state.score(), 1);
        assert!(falling(&state).objects().is_empty());
    }

    #[test]
    fn test_missed_pickup_despawns() {
        let mut state = new_state(FallingParams::default(), vec![Some(0)]);
        for _ in 0..9 {
            state.tick().unwrap();
        }
        assert_eq!(state.score(), 0);
        assert!(falling(&state).objects().is_empty());
    }

    #[test]
    fn test_moving_onto_bottom_row_pickup_collects() {
        let mut state = new_state(FallingParams::default(), vec![Some(7)]);
        // Spawn + fall to the bottom row next to the catcher.
        for _ in 0..8 {
            state.tick().unwrap();
        }
        assert_eq!(falling(&state).objects(), &[Coord::new(7, 7)]);

        state.apply_input(Action::Right).unwrap();
        assert_eq!(state.score(), 1);
        assert!(falling(&state).objects().is_empty());
    }

    #[test]
    fn test_dash_moves_multiple_columns() {
        let mut state = new_state(FallingParams::default(), vec![]);
        state.apply_input(Action::DashRight).unwrap();
        assert_eq!(falling(&state).catcher().x, 8);
    }

    /// Fifteen pickups dropped straight into the catcher's path end the game
    /// on the tick that lands the fifteenth.
    #[test]
    fn test_reaches_score_cap_exactly() {
        let params = FallingParams {
            width: 12,
            score_cap: 15,
            ..FallingParams::default()
        };
        let mut plan = vec![Some(6); 15];
        plan.extend([Some(6); 10]);
        let mut state = new_state(params, plan);

        let mut ticks = 0;
        while state.terminal().is_none() {
            state.tick().unwrap();
            ticks += 1;
        }

        assert_eq!(state.terminal(), Some(TerminalReason::ScoreCapReached));
        assert_eq!(state.score(), 15);
        // First lands on tick 8, one more per tick after that.
        assert_eq!(ticks, 22);
    }
}
