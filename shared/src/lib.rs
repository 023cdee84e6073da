//! Types and transport shared by the game server and its clients.

pub mod connection;
pub mod framing;
pub mod math;
pub mod protocol;

pub use connection::{Client, Connection, Server};
pub use framing::{encode_frame, FrameDecoder, NetError, MAX_FRAME_SIZE};
pub use math::{Point, Vector2};
pub use protocol::{ClientMessage, Player, ServerMessage, StateSnapshot, Wall, MAX_HEALTH};

pub const TICKS_PER_SECOND: u32 = 60;
pub const TIME_STEP: f32 = 1.0 / TICKS_PER_SECOND as f32;
pub const PLAYER_RADIUS: f32 = 1.0;
pub const BULLET_RADIUS: f32 = 0.2;
