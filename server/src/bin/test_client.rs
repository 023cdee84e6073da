//! Headless client for poking at a running server.
//!
//! Connects, asks to spawn at a random point, then wanders and shoots at the
//! nearest player it sees in its snapshots. Respawns after death.

use clap::Parser;
use log::{debug, info, warn};
use rand::Rng;
use shared::{Client, ClientMessage, NetError, Point, ServerMessage, StateSnapshot};
use std::time::Duration;
use tokio::time::{interval, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// How long to play, in seconds
    #[clap(short, long, default_value = "10")]
    duration: u64,
}

fn spawn_request<R: Rng>(rng: &mut R) -> ClientMessage {
    ClientMessage::SpawnRequest {
        point: Point::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)),
    }
}

fn nearest_enemy(snapshot: &StateSnapshot) -> Option<Point> {
    let me = snapshot.player.as_ref()?;
    snapshot
        .other_players
        .iter()
        .map(|other| other.position)
        .min_by(|a, b| {
            a.distance(&me.position)
                .total_cmp(&b.distance(&me.position))
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = rand::thread_rng();

    let mut connection = Client::new(args.host.clone(), args.port).connect().await?;
    info!("Connected to {}:{}", args.host, args.port);
    connection.send(&spawn_request(&mut rng)).await?;

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut input_timer = interval(Duration::from_millis(100));
    let mut latest: Option<StateSnapshot> = None;
    let mut snapshots = 0u64;

    while Instant::now() < deadline {
        tokio::select! {
            readable = connection.readable() => {
                readable?;
                let messages = match connection.receive::<ServerMessage>() {
                    Ok(messages) => messages,
                    Err(NetError::Disconnected) => {
                        warn!("Server closed the connection");
                        break;
                    }
                    Err(e) => return Err(e.into()),
                };

                for message in messages {
                    match message {
                        ServerMessage::UpdateModel { snapshot } => {
                            snapshots += 1;
                            latest = Some(snapshot);
                        }
                        ServerMessage::SpawnResponse { success: true } => info!("Spawned"),
                        ServerMessage::SpawnResponse { success: false } => {
                            debug!("Spawn rejected, retrying");
                            connection.send(&spawn_request(&mut rng)).await?;
                        }
                        ServerMessage::PlayerDeath => {
                            info!("Killed, respawning");
                            connection.send(&spawn_request(&mut rng)).await?;
                        }
                    }
                }
            }
            _ = input_timer.tick() => {
                let Some(snapshot) = latest.as_ref() else {
                    continue;
                };
                let Some(me) = snapshot.player.as_ref() else {
                    continue;
                };

                connection
                    .send(&ClientMessage::MovePlayer {
                        dx: rng.gen_range(-1.0..1.0),
                        dy: rng.gen_range(-1.0..1.0),
                    })
                    .await?;

                if let Some(target) = nearest_enemy(snapshot) {
                    let angle = target.sub(&me.position).angle();
                    connection.send(&ClientMessage::RotatePlayer { angle }).await?;
                    connection
                        .send(&ClientMessage::ShootAt { x: target.x, y: target.y })
                        .await?;
                }
                if snapshot.was_dry_fire {
                    connection.send(&ClientMessage::Reload).await?;
                }
                debug!("Health {}, {} players visible", me.health, snapshot.other_players.len());
            }
        }
    }

    info!("Received {} snapshots", snapshots);
    connection.close().await?;
    Ok(())
}
