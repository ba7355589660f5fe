//! Board renderer: turns a [`GameState`] into a fixed-size grid of ASCII
//! symbols plus the input affordances the presentation layer should offer.

use crate::{Action, Board, Coord, GameState, Variant};

/// Cell symbols.
pub mod symbols {
    pub const EMPTY: char = '.';
    pub const CATCHER: char = 'U';
    pub const PICKUP: char = '*';
    pub const SNAKE_HEAD: char = '@';
    pub const SNAKE_BODY: char = 'o';
    pub const RUNNER: char = '>';
    pub const OBSTACLE: char = '#';
}

/// One presentable frame of a game.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardFrame {
    pub variant: Variant,
    /// `height` rows, each exactly `width` symbols.
    pub rows: Vec<String>,
    pub affordances: Vec<Action>,
    pub score: u32,
    pub score_cap: u32,
    pub remaining_ticks: u64,
    pub digest: u64,
}

impl BoardFrame {
    /// Rows followed by a status line.
    pub fn to_text(&self) -> String {
        let mut text = self.rows.join("\n");
        text.push('\n');
        text.push_str(&format!(
            "score {}/{}  time {}",
            self.score, self.score_cap, self.remaining_ticks
        ));
        text
    }
}

/// Grid being painted.
struct Canvas {
    width: i32,
    height: i32,
    cells: Vec<char>,
}

impl Canvas {
    fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![symbols::EMPTY; (width.max(0) * height.max(0)) as usize],
        }
    }

    /// Out-of-bounds cells are dropped.
    fn put(&mut self, at: Coord, symbol: char) {
        if at.x < 0 || at.y < 0 || at.x >= self.width || at.y >= self.height {
            return;
        }
        self.cells[(at.y * self.width + at.x) as usize] = symbol;
    }

    fn into_rows(self) -> Vec<String> {
        if self.width <= 0 {
            return Vec::new();
        }
        self.cells
            .chunks(self.width as usize)
            .map(|row| row.iter().collect())
            .collect()
    }
}

/// Render the current state of a game.
pub fn render(state: &GameState) -> BoardFrame {
    let canvas = match state.board() {
        Board::Falling(b) => {
            let mut canvas = Canvas::new(b.width(), b.height());
            for object in b.objects() {
                canvas.put(*object, symbols::PICKUP);
            }
            canvas.put(b.catcher(), symbols::CATCHER);
            canvas
        }
        Board::Snake(b) => {
            let mut canvas = Canvas::new(b.width(), b.height());
            for pickup in b.pickups() {
                canvas.put(*pickup, symbols::PICKUP);
            }
            for cell in b.body().iter().skip(1) {
                canvas.put(*cell, symbols::SNAKE_BODY);
            }
            if let Some(head) = b.head() {
                canvas.put(head, symbols::SNAKE_HEAD);
            }
            canvas
        }
        Board::Runner(b) => {
            let mut canvas = Canvas::new(b.width(), b.lanes());
            canvas.put(b.runner(), symbols::RUNNER);
            for (at, kind) in b.entities() {
                let symbol = match kind {
                    crate::EntityKind::Obstacle => symbols::OBSTACLE,
                    crate::EntityKind::Pickup => symbols::PICKUP,
                };
                canvas.put(*at, symbol);
            }
            canvas
        }
    };

    BoardFrame {
        variant: state.variant(),
        rows: canvas.into_rows(),
        affordances: state.affordances().to_vec(),
        score: state.score(),
        score_cap: state.score_cap(),
        remaining_ticks: state.remaining_ticks(),
        digest: state.state_digest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Spawner, VariantParams};

    fn initial(variant: Variant) -> GameState {
        GameState::new(VariantParams::default_for(variant), Spawner::scripted([])).unwrap()
    }

    #[test]
    fn test_falling_frame_shape() {
        let frame = render(&initial(Variant::FallingCollector));
        assert_eq!(frame.rows.len(), 8);
        assert!(frame.rows.iter().all(|r| r.chars().count() == 12));
        assert_eq!(frame.rows[7], "......U.....");
        assert_eq!(
            frame.affordances,
            vec![
                Action::DashLeft,
                Action::Left,
                Action::Right,
                Action::DashRight
            ]
        );
    }

    #[test]
    fn test_snake_frame() {
        let frame = render(&initial(Variant::GridSnakeCollector));
        assert_eq!(frame.rows.len(), 10);
        assert_eq!(frame.rows[5], "..ooo@....");
        assert_eq!(frame.affordances.len(), 4);
    }

    #[test]
    fn test_runner_frame() {
        let mut state = GameState::new(
            VariantParams::default_for(Variant::ScrollRunner),
            Spawner::scripted([Some(0), Some(2)]),
        )
        .unwrap();
        state.tick().unwrap();

        let frame = render(&state);
        assert_eq!(
            frame.rows,
            vec![".........#", ".>........", ".........*"]
        );
        assert_eq!(frame.affordances, vec![Action::Up, Action::Down]);
    }

    #[test]
    fn test_frame_reports_progress() {
        let state = initial(Variant::ScrollRunner);
        let frame = render(&state);
        assert_eq!(frame.score, 0);
        assert_eq!(frame.score_cap, 25);
        assert_eq!(frame.remaining_ticks, 150);
        assert_eq!(frame.digest, state.state_digest());

        let text = frame.to_text();
        assert!(text.ends_with("score 0/25  time 150"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_canvas_drops_out_of_bounds() {
        let mut canvas = Canvas::new(2, 2);
        canvas.put(Coord::new(-1, 0), 'x');
        canvas.put(Coord::new(2, 1), 'x');
        canvas.put(Coord::new(1, 1), 'x');
        assert_eq!(canvas.into_rows(), vec!["..", ".x"]);
    }
}
