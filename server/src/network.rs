//! Server loop tying sockets, bots and the simulation together

use crate::ai::{AiEngine, SpawnArea};
use crate::client_manager::ClientManager;
use crate::config::{GameModelConfig, ServerConfig};
use crate::game::{GameError, GameModel, TickOutcome};
use crate::physics::PlayerId;
use log::{debug, error, info, warn};
use shared::{Connection, NetError, Point, Server, ServerMessage, Wall};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, MissedTickBehavior};

/// State mutated by a tick, guarded as one unit.
pub struct World {
    pub model: GameModel,
    pub ai: AiEngine,
    pub spawn_requests: BTreeMap<PlayerId, Point>,
    pub players_to_remove: Vec<PlayerId>,
}

/// Authoritative game server running a fixed-rate tick
pub struct GameServer {
    local_addr: SocketAddr,
    world: Arc<Mutex<World>>,
    clients: ClientManager,
    tick_duration: Duration,
    connection_rx: mpsc::UnboundedReceiver<Connection>,
}

impl GameServer {
    /// Binds the listening socket and starts accepting connections in the
    /// background. Ticks do not run until [`GameServer::run`] or
    /// [`GameServer::tick`] is called.
    pub async fn bind(
        config: ServerConfig,
        walls: Vec<Wall>,
        model_config: GameModelConfig,
    ) -> Result<Self, NetError> {
        let listener = Server::bind(&config.addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        Self::spawn_acceptor(listener, connection_tx);

        let world = World {
            model: GameModel::new(walls, model_config),
            ai: AiEngine::new(
                config.bot_count,
                SpawnArea::default(),
                model_config.bullet_speed,
                config.seed,
            ),
            spawn_requests: BTreeMap::new(),
            players_to_remove: Vec::new(),
        };

        Ok(Self {
            local_addr,
            world: Arc::new(Mutex::new(world)),
            clients: ClientManager::new(config.max_clients, config.move_action_ttl),
            tick_duration: config.tick_duration,
            connection_rx,
        })
    }

    /// Spawns task that accepts connections and hands them to the tick loop
    fn spawn_acceptor(listener: Server, connection_tx: mpsc::UnboundedSender<Connection>) {
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok(connection) => {
                        debug!("Accepted connection from {:?}", connection.peer_addr());
                        if connection_tx.send(connection).is_err() {
                            debug!("Server loop is gone, no longer accepting");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared handle to the simulation, for inspection between ticks.
    pub fn world(&self) -> Arc<Mutex<World>> {
        Arc::clone(&self.world)
    }

    /// Runs one tick.
    ///
    /// Connection bookkeeping and socket reads happen first, then the world
    /// is locked for the simulation step only. Snapshots are sent after the
    /// lock is released.
    pub async fn tick(&mut self) -> Result<(), GameError> {
        // Removals queued during the previous tick
        let removed = self.clients.take_removals().await;

        while let Ok(connection) = self.connection_rx.try_recv() {
            self.clients.add_client(connection);
        }

        let spawn_requests = self.clients.receive_all();

        let outcome = {
            let mut guard = self.world.lock().await;
            let world = &mut *guard;

            world.players_to_remove.extend(removed);
            world.spawn_requests.extend(spawn_requests);

            let mut input = self.clients.collect_intents();
            input.spawn_requests = std::mem::take(&mut world.spawn_requests);
            input.players_to_remove = std::mem::take(&mut world.players_to_remove);
            input.merge(world.ai.compute_next_step(&world.model)?);

            world.model.next_step(&input)?;
            world.model.outcome()?
        };

        self.broadcast(&outcome).await;
        Ok(())
    }

    /// Sends the tick's snapshot to every connection, then spawn results and
    /// death notices to the players they concern.
    async fn broadcast(&mut self, outcome: &TickOutcome) {
        for id in self.clients.live_ids() {
            let message = ServerMessage::UpdateModel {
                snapshot: outcome.snapshot_for(id),
            };
            self.clients.send_to(id, &message).await;
        }

        for &id in &outcome.spawned_players {
            if self.clients.contains(id) {
                self.clients
                    .send_to(id, &ServerMessage::SpawnResponse { success: true })
                    .await;
            }
        }
        for &id in &outcome.failed_to_spawn_players {
            if self.clients.contains(id) {
                self.clients
                    .send_to(id, &ServerMessage::SpawnResponse { success: false })
                    .await;
            }
        }
        for &id in &outcome.killed_players {
            if self.clients.contains(id) {
                self.clients.send_to(id, &ServerMessage::PlayerDeath).await;
            }
        }
    }

    /// Main server loop. Returns only if a tick fails, which leaves the
    /// world in an unknown state.
    pub async fn run(&mut self) -> Result<(), GameError> {
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!("Game loop started");

        loop {
            tick_interval.tick().await;

            let now = Instant::now();
            let dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;

            if let Err(e) = self.tick().await {
                error!("Tick failed: {}", e);
                return Err(e);
            }

            // Periodic performance monitoring
            let world = self.world.lock().await;
            let tick = world.model.current_tick();
            if tick % u64::from(shared::TICKS_PER_SECOND) == 0 {
                debug!(
                    "Tick {}: {} clients, {} bodies, {:.1}Hz",
                    tick,
                    self.clients.len(),
                    world.model.body_count(),
                    1.0 / dt.max(f32::EPSILON)
                );
            }
            if dt > self.tick_duration.as_secs_f32() * 2.0 {
                warn!("Tick {} started {:.3}s after the previous one", tick, dt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Client, ClientMessage};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn test_config(bot_count: u32) -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            bot_count,
            seed: Some(1),
            ..ServerConfig::default()
        }
    }

    async fn connect(server: &GameServer) -> Connection {
        Client::new("127.0.0.1", server.local_addr().port())
            .connect()
            .await
            .unwrap()
    }

    /// Ticks the server until the client has received a message matching
    /// `predicate`.
    async fn tick_until<F>(server: &mut GameServer, client: &mut Connection, predicate: F) -> ServerMessage
    where
        F: Fn(&ServerMessage) -> bool,
    {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                server.tick().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
                for message in client.receive::<ServerMessage>().unwrap() {
                    if predicate(&message) {
                        return message;
                    }
                }
            }
        })
        .await
        .expect("timed out waiting for server message")
    }

    #[tokio::test]
    async fn test_client_receives_snapshots() {
        let mut server = GameServer::bind(test_config(0), Vec::new(), GameModelConfig::default())
            .await
            .unwrap();
        let mut client = connect(&server).await;

        let message = tick_until(&mut server, &mut client, |m| {
            matches!(m, ServerMessage::UpdateModel { .. })
        })
        .await;
        match message {
            ServerMessage::UpdateModel { snapshot } => {
                assert!(snapshot.player.is_none());
                assert_eq!(snapshot.player_radius, shared::PLAYER_RADIUS);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_spawn_round_trip() {
        let mut server = GameServer::bind(test_config(0), Vec::new(), GameModelConfig::default())
            .await
            .unwrap();
        let mut client = connect(&server).await;
        server.tick().await.unwrap();

        client
            .send(&ClientMessage::SpawnRequest {
                point: Point::new(3.0, 4.0),
            })
            .await
            .unwrap();

        let message = tick_until(&mut server, &mut client, |m| {
            matches!(m, ServerMessage::SpawnResponse { .. })
        })
        .await;
        assert_eq!(message, ServerMessage::SpawnResponse { success: true });

        let world = server.world();
        let world = world.lock().await;
        assert!(world.model.is_alive(0));
    }

    #[tokio::test]
    async fn test_bots_spawn_without_clients() {
        let mut server = GameServer::bind(test_config(3), Vec::new(), GameModelConfig::default())
            .await
            .unwrap();
        for _ in 0..5 {
            server.tick().await.unwrap();
        }

        let world = server.world();
        let world = world.lock().await;
        let alive = [-1, -2, -3]
            .iter()
            .filter(|id| world.model.is_alive(**id))
            .count();
        assert!(alive > 0);
    }

    #[tokio::test]
    async fn test_disconnect_removes_player() {
        let mut server = GameServer::bind(test_config(0), Vec::new(), GameModelConfig::default())
            .await
            .unwrap();
        let mut client = connect(&server).await;
        server.tick().await.unwrap();

        client
            .send(&ClientMessage::SpawnRequest {
                point: Point::new(0.0, 0.0),
            })
            .await
            .unwrap();
        tick_until(&mut server, &mut client, |m| {
            matches!(m, ServerMessage::SpawnResponse { success: true })
        })
        .await;

        client.close().await.unwrap();
        let removed = tokio::time::timeout(TIMEOUT, async {
            loop {
                server.tick().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
                let world = server.world();
                let world = world.lock().await;
                if !world.model.is_alive(0) {
                    return true;
                }
            }
        })
        .await
        .unwrap();
        assert!(removed);
        assert!(server.clients.is_empty());
    }
}
