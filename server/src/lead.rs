//! Intercept prediction for straight-line shots at a moving target.
//!
//! Splits the target velocity into a component along the shooter-to-target
//! line and one orthogonal to it. The bullet must match the orthogonal part
//! exactly; whatever speed remains closes the distance along the line.

use shared::{Point, Vector2};

#[derive(Debug, Clone, Copy)]
pub struct LeadCalculator {
    bullet_speed: f32,
}

impl LeadCalculator {
    pub fn new(bullet_speed: f32) -> Self {
        Self { bullet_speed }
    }

    /// Point where a bullet fired now from `shooter` meets a target moving
    /// with constant `target_velocity`.
    ///
    /// Returns `None` when the bullet can never catch the target.
    pub fn collision_point(
        &self,
        shooter: Point,
        target: Point,
        target_velocity: Vector2,
    ) -> Option<Point> {
        let offset = target.sub(&shooter);
        let distance = offset.length();
        if distance == 0.0 {
            return Some(target);
        }

        let direction = offset.scale(1.0 / distance);
        let parallel_speed = direction.dot(&target_velocity);
        let orthogonal_speed_squared =
            target_velocity.length_squared() - parallel_speed * parallel_speed;

        let radicand = self.bullet_speed * self.bullet_speed - orthogonal_speed_squared;
        if radicand < 0.0 {
            return None;
        }
        let closing_speed = radicand.sqrt() - parallel_speed;
        if closing_speed <= 0.0 {
            return None;
        }

        let time = distance / closing_speed;
        if !time.is_finite() {
            return None;
        }
        Some(target.add(&target_velocity.scale(time)))
    }
}
