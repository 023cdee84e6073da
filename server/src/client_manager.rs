//! Connected clients and their buffered intents
//!
//! This module owns the server side of every open connection:
//! - Player id assignment for accepted sockets
//! - Routing of decoded client messages into per-connection intent buffers
//! - Draining those buffers once per tick into a simulation input
//! - Queuing broken connections for removal at the next tick boundary
//!
//! Intents are buffered rather than applied on arrival. A movement intent
//! stays active for a few ticks so a lost or late packet does not make the
//! player stutter; every other intent is consumed by the first tick that
//! sees it.

use crate::game::StepInput;
use crate::physics::PlayerId;
use log::{debug, info, warn};
use parking_lot::Mutex;
use shared::{ClientMessage, Connection, NetError, Point, ServerMessage, Vector2};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct BufferedIntents {
    move_action: Option<Vector2>,
    move_action_ttl: u32,
    shoot_action: Option<Point>,
    rotate_action: Option<f32>,
    reload_action: bool,
}

/// Intent buffer for one player.
///
/// Writes come from message routing and reads from the tick, so every field
/// sits behind one lock. The last write before a read wins.
#[derive(Debug)]
pub struct PlayerConnection {
    player_id: PlayerId,
    move_action_ttl: u32,
    intents: Mutex<BufferedIntents>,
}

impl PlayerConnection {
    /// Creates an empty buffer whose movement intents last `move_action_ttl`
    /// ticks.
    pub fn new(player_id: PlayerId, move_action_ttl: u32) -> Self {
        Self {
            player_id,
            move_action_ttl,
            intents: Mutex::new(BufferedIntents::default()),
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Stores a movement direction and restarts its countdown.
    pub fn accept_move_action(&self, direction: Vector2) {
        let mut intents = self.intents.lock();
        intents.move_action = Some(direction);
        intents.move_action_ttl = self.move_action_ttl;
    }

    /// Returns the buffered direction while its countdown lasts.
    ///
    /// Each call uses up one tick of the countdown. Once it reaches zero the
    /// direction is forgotten and `None` is returned until a new one arrives.
    pub fn move_action(&self) -> Option<Vector2> {
        let mut intents = self.intents.lock();
        if intents.move_action_ttl > 0 {
            intents.move_action_ttl -= 1;
            intents.move_action
        } else {
            intents.move_action = None;
            None
        }
    }

    pub fn accept_shoot_action(&self, target: Point) {
        self.intents.lock().shoot_action = Some(target);
    }

    pub fn shoot_action(&self) -> Option<Point> {
        self.intents.lock().shoot_action.take()
    }

    pub fn accept_rotate_action(&self, angle: f32) {
        self.intents.lock().rotate_action = Some(angle);
    }

    pub fn rotate_action(&self) -> Option<f32> {
        self.intents.lock().rotate_action.take()
    }

    pub fn accept_reload_action(&self) {
        self.intents.lock().reload_action = true;
    }

    pub fn reload_action(&self) -> bool {
        std::mem::take(&mut self.intents.lock().reload_action)
    }

    /// Routes one decoded message into the buffer.
    ///
    /// Spawn requests are not buffered per player and are handed back to the
    /// caller instead.
    pub fn accept(&self, message: ClientMessage) -> Option<Point> {
        match message {
            ClientMessage::MovePlayer { dx, dy } => self.accept_move_action(Vector2::new(dx, dy)),
            ClientMessage::RotatePlayer { angle } => self.accept_rotate_action(angle),
            ClientMessage::ShootAt { x, y } => self.accept_shoot_action(Point::new(x, y)),
            ClientMessage::Reload => self.accept_reload_action(),
            ClientMessage::SpawnRequest { point } => return Some(point),
        }
        None
    }
}

/// One open socket and the player it controls.
#[derive(Debug)]
pub struct Client {
    pub id: PlayerId,
    connection: Connection,
    pub intents: PlayerConnection,
}

/// Registry of open connections.
///
/// Ids are handed out from zero upwards in accept order and never reused.
/// A connection that fails is not dropped on the spot: it is queued and
/// left untouched until [`ClientManager::take_removals`] runs at the start
/// of the next tick.
pub struct ClientManager {
    clients: BTreeMap<PlayerId, Client>,
    next_player_id: PlayerId,
    max_clients: usize,
    move_action_ttl: u32,
    removal_queue: BTreeSet<PlayerId>,
}

impl ClientManager {
    pub fn new(max_clients: usize, move_action_ttl: u32) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_player_id: 0,
            max_clients,
            move_action_ttl,
            removal_queue: BTreeSet::new(),
        }
    }

    /// Registers an accepted connection.
    ///
    /// Returns the new player id, or `None` when the server is full, in which
    /// case the connection is dropped.
    pub fn add_client(&mut self, connection: Connection) -> Option<PlayerId> {
        if self.clients.len() >= self.max_clients {
            warn!(
                "Rejecting connection from {:?}: server is full",
                connection.peer_addr()
            );
            return None;
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        info!("Client {} connected from {:?}", id, connection.peer_addr());
        self.clients.insert(
            id,
            Client {
                id,
                connection,
                intents: PlayerConnection::new(id, self.move_action_ttl),
            },
        );
        Some(id)
    }

    /// Marks a connection as broken. It stays registered until the next
    /// call to [`ClientManager::take_removals`].
    pub fn queue_removal(&mut self, id: PlayerId) {
        if self.clients.contains_key(&id) {
            self.removal_queue.insert(id);
        }
    }

    pub fn is_pending_removal(&self, id: PlayerId) -> bool {
        self.removal_queue.contains(&id)
    }

    /// Closes and forgets every queued connection, returning their ids.
    pub async fn take_removals(&mut self) -> Vec<PlayerId> {
        let queued = std::mem::take(&mut self.removal_queue);
        let mut removed = Vec::with_capacity(queued.len());

        for id in queued {
            if let Some(client) = self.clients.remove(&id) {
                if let Err(e) = client.connection.close().await {
                    debug!("Closing connection of client {} failed: {}", id, e);
                }
                info!("Client {} disconnected", id);
                removed.push(id);
            }
        }
        removed
    }

    /// Reads whatever every live connection has sent since the last tick and
    /// routes it into the intent buffers.
    ///
    /// Returns the spawn requests found along the way. A connection that fails
    /// to read is queued for removal.
    pub fn receive_all(&mut self) -> BTreeMap<PlayerId, Point> {
        let mut spawn_requests = BTreeMap::new();
        let mut failed = Vec::new();

        for (id, client) in self.clients.iter_mut() {
            if self.removal_queue.contains(id) {
                continue;
            }

            match client.connection.receive::<ClientMessage>() {
                Ok(messages) => {
                    for message in messages {
                        if let Some(point) = client.intents.accept(message) {
                            spawn_requests.insert(*id, point);
                        }
                    }
                }
                Err(NetError::Disconnected) => {
                    debug!("Client {} closed its connection", id);
                    failed.push(*id);
                }
                Err(e) if e.is_protocol_error() => {
                    warn!("Client {} sent a corrupt frame: {}", id, e);
                    failed.push(*id);
                }
                Err(e) => {
                    warn!("Failed to read from client {}: {}", id, e);
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            self.queue_removal(id);
        }
        spawn_requests
    }

    /// Drains one tick's worth of intents from every live connection.
    pub fn collect_intents(&self) -> StepInput {
        let mut input = StepInput::default();

        for (id, client) in self.live_clients() {
            if let Some(direction) = client.intents.move_action() {
                input.move_actions.insert(id, direction);
            }
            if let Some(angle) = client.intents.rotate_action() {
                input.rotate_actions.insert(id, angle);
            }
            if let Some(target) = client.intents.shoot_action() {
                input.shoot_actions.insert(id, target);
            }
            if client.intents.reload_action() {
                input.reloading_players.insert(id);
            }
        }
        input
    }

    /// Sends a message to one live connection. A failed send queues the
    /// connection for removal.
    pub async fn send_to(&mut self, id: PlayerId, message: &ServerMessage) {
        if self.removal_queue.contains(&id) {
            return;
        }
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };

        if let Err(e) = client.connection.send(message).await {
            warn!("Failed to send to client {}: {}", id, e);
            self.removal_queue.insert(id);
        }
    }

    fn live_clients(&self) -> impl Iterator<Item = (PlayerId, &Client)> + '_ {
        self.clients
            .iter()
            .filter(|(id, _)| !self.removal_queue.contains(id))
            .map(|(id, client)| (*id, client))
    }

    /// Ids of connections that are not waiting for removal.
    pub fn live_ids(&self) -> Vec<PlayerId> {
        self.live_clients().map(|(id, _)| id).collect()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.clients.contains_key(&id) && !self.removal_queue.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
