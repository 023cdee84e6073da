use serde::{Deserialize, Serialize};

/// A vector in 2D world space. Used for positions, velocities and aim directions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector2 {
    /// Value along the x-axis.
    pub x: f32,
    /// Value along the y-axis.
    pub y: f32,
}

/// Positions on the wire are plain vectors.
pub type Point = Vector2;

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Returns the unit vector, or zero for a zero-length vector.
    pub fn normalize(&self) -> Vector2 {
        let len = self.length();
        if len == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / len,
                y: self.y / len,
            }
        }
    }

    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn dot(&self, other: &Vector2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(&self, other: &Vector2) -> f32 {
        self.sub(other).length()
    }

    /// Angle in radians measured counter-clockwise from the positive x-axis.
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_length() {
        let v = Vector2::new(3.0, 4.0);
        assert_eq!(v.length(), 5.0);
        assert_eq!(v.length_squared(), 25.0);
    }

    #[test]
    fn test_normalize() {
        let v = Vector2::new(0.0, -10.0).normalize();
        assert_approx_eq!(v.x, 0.0, 1e-6);
        assert_approx_eq!(v.y, -1.0, 1e-6);
    }

    #[test]
    fn test_normalize_zero_stays_zero() {
        assert_eq!(Vector2::ZERO.normalize(), Vector2::ZERO);
    }

    #[test]
    fn test_arithmetic() {
        let a = Vector2::new(1.0, 2.0);
        let b = Vector2::new(-3.0, 5.0);
        assert_eq!(a.add(&b), Vector2::new(-2.0, 7.0));
        assert_eq!(a.sub(&b), Vector2::new(4.0, -3.0));
        assert_eq!(a.scale(2.0), Vector2::new(2.0, 4.0));
        assert_eq!(a.dot(&b), 7.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_angle() {
        assert_approx_eq!(Vector2::new(0.0, 1.0).angle(), std::f32::consts::FRAC_PI_2, 1e-6);
        assert_approx_eq!(Vector2::new(-1.0, 0.0).angle(), std::f32::consts::PI, 1e-6);
    }
}
