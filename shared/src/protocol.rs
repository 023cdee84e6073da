//! Wire messages and the per-recipient state snapshot.
//!
//! Every value that crosses the socket is one of [`ClientMessage`] or
//! [`ServerMessage`]. Both are closed sum types so the receiving side decodes
//! once at the protocol boundary and then matches exhaustively.

use crate::math::{Point, Vector2};
use serde::{Deserialize, Serialize};

pub const MAX_HEALTH: i32 = 100;

/// Messages sent from client to server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientMessage {
    /// Desired movement direction, not necessarily normalized.
    MovePlayer { dx: f32, dy: f32 },
    /// Facing angle in radians.
    RotatePlayer { angle: f32 },
    /// World-space aim point.
    ShootAt { x: f32, y: f32 },
    SpawnRequest { point: Point },
    Reload,
}

/// Messages sent from server to client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerMessage {
    UpdateModel { snapshot: StateSnapshot },
    SpawnResponse { success: bool },
    PlayerDeath,
}

/// Public view of a living player.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub position: Point,
    pub velocity: Vector2,
    pub angle: f32,
    pub health: i32,
}

impl Player {
    pub fn new(position: Point, velocity: Vector2, angle: f32, health: i32) -> Self {
        Self {
            position,
            velocity,
            angle,
            health,
        }
    }
}

/// Static wall geometry: a body position plus polygon vertices relative to it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Wall {
    pub position: Point,
    pub points: Vec<Point>,
}

impl Wall {
    pub fn new(position: Point, points: Vec<Point>) -> Self {
        Self { position, points }
    }

    /// Axis-aligned box centred on `position`.
    pub fn rect(position: Point, half_width: f32, half_height: f32) -> Self {
        Self::new(
            position,
            vec![
                Point::new(-half_width, -half_height),
                Point::new(half_width, -half_height),
                Point::new(half_width, half_height),
                Point::new(-half_width, half_height),
            ],
        )
    }
}

/// Read-only projection of the world for one recipient, sent once per tick.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct StateSnapshot {
    /// The recipient's own player, absent while dead.
    pub player: Option<Player>,
    pub other_players: Vec<Player>,
    pub walls: Vec<Wall>,
    pub bullets: Vec<Point>,
    pub was_dry_fire: bool,
    pub was_reload: bool,
    pub was_shot: bool,
    pub bullet_radius: f32,
    pub player_radius: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> StateSnapshot {
        StateSnapshot {
            player: Some(Player::new(
                Point::new(1.5, -2.0),
                Vector2::new(0.25, 0.0),
                1.2,
                87,
            )),
            other_players: vec![Player::new(Point::new(0.0, 1.0), Vector2::ZERO, 0.0, 100)],
            walls: vec![Wall::new(
                Point::new(0.0, 0.0),
                vec![Point::new(10.0, 0.0), Point::new(0.0, 10.0), Point::new(0.0, 0.0)],
            )],
            bullets: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            was_dry_fire: false,
            was_reload: true,
            was_shot: true,
            bullet_radius: 0.2,
            player_radius: 1.0,
        }
    }

    #[test]
    fn test_update_model_roundtrip() {
        let message = ServerMessage::UpdateModel {
            snapshot: sample_snapshot(),
        };
        let serialized = bincode::serialize(&message).unwrap();
        let deserialized: ServerMessage = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            ServerMessage::UpdateModel { snapshot } => assert_eq!(snapshot, sample_snapshot()),
            _ => panic!("Wrong message type after deserialization"),
        }
    }

    #[test]
    fn test_snapshot_without_own_player() {
        let mut snapshot = sample_snapshot();
        snapshot.player = None;

        let serialized = bincode::serialize(&snapshot).unwrap();
        let deserialized: StateSnapshot = bincode::deserialize(&serialized).unwrap();
        assert!(deserialized.player.is_none());
        assert_eq!(deserialized, snapshot);
    }

    #[test]
    fn test_client_message_serialization() {
        let messages = vec![
            ClientMessage::MovePlayer { dx: 1.0, dy: -0.5 },
            ClientMessage::RotatePlayer { angle: 3.1 },
            ClientMessage::ShootAt { x: 4.0, y: 5.0 },
            ClientMessage::SpawnRequest {
                point: Point::new(40.0, 40.0),
            },
            ClientMessage::Reload,
        ];

        for message in messages {
            let serialized = bincode::serialize(&message).unwrap();
            let deserialized: ClientMessage = bincode::deserialize(&serialized).unwrap();
            assert_eq!(deserialized, message);
        }
    }

    #[test]
    fn test_rect_wall_vertices() {
        let wall = Wall::rect(Point::new(5.0, 5.0), 2.0, 1.0);
        assert_eq!(wall.points.len(), 4);
        assert_eq!(wall.points[0], Point::new(-2.0, -1.0));
        assert_eq!(wall.points[2], Point::new(2.0, 1.0));
    }
}
