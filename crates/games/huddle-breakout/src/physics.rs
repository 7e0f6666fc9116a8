use std::f32::consts::FRAC_PI_3;

use serde::{Deserialize, Serialize};

use crate::layout::{
    BALL_RADIUS, BALL_SPEED, BRICK_HEIGHT, BRICK_WIDTH, Brick, FIELD_HEIGHT, FIELD_WIDTH,
    PADDLE_HEIGHT, PADDLE_WIDTH,
};

/// Minimum upward speed after a paddle bounce. Without this, an edge hit
/// could send the ball nearly horizontal and stall the game.
pub const MIN_UPWARD_SPEED: f32 = 2.0;

/// A ball in flight. Velocity is in pixels per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Ball {
    /// Spawn a ball above the paddle row, launched upward with a random
    /// horizontal direction.
    pub fn launch(towards_right: bool) -> Self {
        Self {
            x: FIELD_WIDTH / 2.0,
            y: FIELD_HEIGHT - 100.0,
            dx: if towards_right { BALL_SPEED } else { -BALL_SPEED },
            dy: -BALL_SPEED,
        }
    }

    /// Advance one tick and reflect off the side walls and ceiling. The
    /// floor is open; callers check [`Ball::is_lost`] after stepping.
    pub fn step(&mut self) {
        self.x += self.dx;
        self.y += self.dy;

        if self.x <= BALL_RADIUS || self.x >= FIELD_WIDTH - BALL_RADIUS {
            self.dx = -self.dx;
            self.x = self.x.clamp(BALL_RADIUS, FIELD_WIDTH - BALL_RADIUS);
        }
        if self.y <= BALL_RADIUS {
            self.dy = -self.dy;
            self.y = BALL_RADIUS;
        }
    }

    /// Whether the ball has fallen past the bottom edge.
    pub fn is_lost(&self) -> bool {
        self.y > FIELD_HEIGHT + BALL_RADIUS
    }

    /// Bounce off a paddle if the ball is descending through its band.
    /// The exit angle depends on where the ball struck: dead center goes
    /// straight up, the edges deflect up to 60 degrees.
    pub fn bounce_off_paddle(&mut self, paddle_x: f32, paddle_y: f32) -> bool {
        let descending = self.dy > 0.0;
        let within_x = self.x >= paddle_x && self.x <= paddle_x + PADDLE_WIDTH;
        let within_y =
            self.y + BALL_RADIUS >= paddle_y && self.y - BALL_RADIUS <= paddle_y + PADDLE_HEIGHT;
        if !(descending && within_x && within_y) {
            return false;
        }

        let hit_pos = (self.x - paddle_x) / PADDLE_WIDTH;
        let angle = (hit_pos - 0.5) * 2.0 * FRAC_PI_3;
        self.dx = BALL_SPEED * angle.sin();
        self.dy = -BALL_SPEED * angle.cos();
        if self.dy > -MIN_UPWARD_SPEED {
            self.dy = -MIN_UPWARD_SPEED;
        }
        true
    }

    /// Whether the ball center sits inside a live brick. Reflects the
    /// vertical velocity on hit; the caller marks the brick destroyed.
    pub fn hits_brick(&mut self, brick: &Brick) -> bool {
        if brick.destroyed {
            return false;
        }
        let inside = self.x >= brick.x
            && self.x <= brick.x + BRICK_WIDTH
            && self.y >= brick.y
            && self.y <= brick.y + BRICK_HEIGHT;
        if inside {
            self.dy = -self.dy;
        }
        inside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::build_brick_grid;

    #[test]
    fn side_walls_reflect_horizontal_velocity() {
        let mut ball = Ball {
            x: BALL_RADIUS + 1.0,
            y: 300.0,
            dx: -BALL_SPEED,
            dy: 1.0,
        };
        ball.step();
        assert!(ball.dx > 0.0);
        assert!(ball.x >= BALL_RADIUS);
    }

    #[test]
    fn ceiling_reflects_vertical_velocity() {
        let mut ball = Ball {
            x: 400.0,
            y: BALL_RADIUS + 1.0,
            dx: 0.0,
            dy: -BALL_SPEED,
        };
        ball.step();
        assert!(ball.dy > 0.0);
    }

    #[test]
    fn floor_is_open() {
        let mut ball = Ball {
            x: 400.0,
            y: FIELD_HEIGHT + BALL_RADIUS,
            dx: 0.0,
            dy: BALL_SPEED,
        };
        ball.step();
        assert!(ball.is_lost());
    }

    #[test]
    fn center_paddle_hit_goes_straight_up() {
        let paddle_x = 350.0;
        let paddle_y = 570.0;
        let mut ball = Ball {
            x: paddle_x + PADDLE_WIDTH / 2.0,
            y: paddle_y - BALL_RADIUS,
            dx: 1.0,
            dy: BALL_SPEED,
        };
        assert!(ball.bounce_off_paddle(paddle_x, paddle_y));
        assert!(ball.dx.abs() < 1e-4);
        assert!((ball.dy + BALL_SPEED).abs() < 1e-4);
    }

    #[test]
    fn edge_paddle_hit_deflects_up_to_sixty_degrees() {
        let paddle_x = 350.0;
        let paddle_y = 570.0;
        let mut ball = Ball {
            x: paddle_x + PADDLE_WIDTH,
            y: paddle_y,
            dx: 0.0,
            dy: BALL_SPEED,
        };
        assert!(ball.bounce_off_paddle(paddle_x, paddle_y));
        // sin(60deg) * speed horizontally, still moving upward
        assert!((ball.dx - BALL_SPEED * FRAC_PI_3.sin()).abs() < 1e-4);
        assert!(ball.dy <= -MIN_UPWARD_SPEED);
    }

    #[test]
    fn ascending_ball_passes_through_paddle() {
        let mut ball = Ball {
            x: 400.0,
            y: 570.0,
            dx: 0.0,
            dy: -BALL_SPEED,
        };
        assert!(!ball.bounce_off_paddle(350.0, 570.0));
    }

    #[test]
    fn brick_hit_reflects_and_reports() {
        let bricks = build_brick_grid();
        let target = &bricks[0];
        let mut ball = Ball {
            x: target.x + BRICK_WIDTH / 2.0,
            y: target.y + BRICK_HEIGHT / 2.0,
            dx: 0.0,
            dy: -BALL_SPEED,
        };
        assert!(ball.hits_brick(target));
        assert!(ball.dy > 0.0);

        let mut destroyed = target.clone();
        destroyed.destroyed = true;
        assert!(!ball.hits_brick(&destroyed));
    }
}
