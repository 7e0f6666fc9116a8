use serde::{Deserialize, Serialize};

/// Playfield width in canvas pixels.
pub const FIELD_WIDTH: f32 = 800.0;
/// Playfield height in canvas pixels.
pub const FIELD_HEIGHT: f32 = 600.0;
/// Paddle size.
pub const PADDLE_WIDTH: f32 = 100.0;
pub const PADDLE_HEIGHT: f32 = 15.0;
/// Ball radius.
pub const BALL_RADIUS: f32 = 8.0;
/// Ball speed in pixels per tick (60 ticks per second).
pub const BALL_SPEED: f32 = 4.0;
/// Brick grid dimensions.
pub const BRICK_ROWS: usize = 8;
pub const BRICK_COLS: usize = 10;
pub const BRICK_WIDTH: f32 = 75.0;
pub const BRICK_HEIGHT: f32 = 20.0;
pub const BRICK_PADDING: f32 = 5.0;
/// Vertical offset of the brick grid from the top of the field.
pub const BRICK_GRID_TOP: f32 = 50.0;

/// Vertical position of the first paddle; each additional player stacks
/// one slot higher.
pub const PADDLE_BASE_Y: f32 = FIELD_HEIGHT - 30.0;
pub const PADDLE_STACK_STEP: f32 = 25.0;

/// Colors cycled through as players join.
pub const PLAYER_PALETTE: &[&str] = &[
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9", "#F8C471", "#82E0AA", "#F1948A", "#85C1E9", "#D7BDE2",
];

/// Brick colors cycled per row, top to bottom.
pub const BRICK_COLORS: &[&str] = &[
    "#FF6B6B", "#FF8E53", "#FF6B9D", "#C44569", "#F8B500", "#FFC048", "#FFD93D", "#6BCF7F",
];

/// One brick in the grid. Destroyed bricks stay in the list so clients can
/// animate them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brick {
    pub x: f32,
    pub y: f32,
    pub destroyed: bool,
    pub color: String,
    pub points: u32,
}

/// Point value for a brick in the given row (0 = top). Rows near the
/// paddles are worth more since they are harder to keep alive.
pub fn row_points(row: usize) -> u32 {
    (row as u32 + 1) * 10
}

/// Build the full brick grid in row-major order.
pub fn build_brick_grid() -> Vec<Brick> {
    let mut bricks = Vec::with_capacity(BRICK_ROWS * BRICK_COLS);
    for row in 0..BRICK_ROWS {
        for col in 0..BRICK_COLS {
            bricks.push(Brick {
                x: col as f32 * (BRICK_WIDTH + BRICK_PADDING) + BRICK_PADDING,
                y: row as f32 * (BRICK_HEIGHT + BRICK_PADDING) + BRICK_GRID_TOP,
                destroyed: false,
                color: BRICK_COLORS[row % BRICK_COLORS.len()].to_string(),
                points: row_points(row),
            });
        }
    }
    bricks
}
