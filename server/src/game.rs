//! Authoritative simulation core.
//!
//! [`GameModel`] owns the physics world and every living player's body. Each
//! call to [`GameModel::next_step`] runs one fixed tick in a strict order:
//!
//! 1. invariant check
//! 2. reset of last tick's outcomes
//! 3. spawn requests
//! 4. removals
//! 5. movement forces
//! 6. rotations
//! 7. shots
//! 8. reloads
//! 9. physics step
//! 10. bullet damage
//!
//! after which the tick counter advances. Outcomes of the tick (who spawned,
//! who died, whether anyone fired) stay queryable until the next call.
//!
//! The weapon is not stored as an explicit state. Whether a player may fire
//! is derived from the tick of their last shot, the tick of their last reload
//! and their ammo count.

use crate::config::GameModelConfig;
use crate::physics::{BodyHandle, BodyKind, BulletHit, PhysicsWorld, PlayerId};
use log::{debug, trace, warn};
use shared::{
    Player, Point, StateSnapshot, Vector2, Wall, BULLET_RADIUS, MAX_HEALTH, PLAYER_RADIUS,
    TICKS_PER_SECOND,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

pub const MAX_BULLET_COUNT: usize = 100;
pub const MAX_SPEED: f32 = 10.0;
pub const FORCE_SCALE: f32 = 100.0;
pub const BRAKING_FORCE: f32 = 20.0;
pub const MIN_SHOOTING_CYCLE_IN_TICKS: u64 = TICKS_PER_SECOND as u64 / 12;
pub const RELOAD_TIME_IN_TICKS: u64 = 2 * TICKS_PER_SECOND as u64;
/// Health lost per unit of summed squared impact speed.
const DAMAGE_DIVISOR: i32 = 10;

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("player {0} is not alive")]
    UnknownPlayer(PlayerId),
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

/// Everything the outside world asks of one tick.
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    pub spawn_requests: BTreeMap<PlayerId, Point>,
    pub players_to_remove: Vec<PlayerId>,
    pub move_actions: BTreeMap<PlayerId, Vector2>,
    pub rotate_actions: BTreeMap<PlayerId, f32>,
    pub shoot_actions: BTreeMap<PlayerId, Point>,
    pub reloading_players: BTreeSet<PlayerId>,
}

impl StepInput {
    /// Folds another set of intents into this one. Later values win on
    /// conflicting ids.
    pub fn merge(&mut self, other: StepInput) {
        self.spawn_requests.extend(other.spawn_requests);
        self.players_to_remove.extend(other.players_to_remove);
        self.move_actions.extend(other.move_actions);
        self.rotate_actions.extend(other.rotate_actions);
        self.shoot_actions.extend(other.shoot_actions);
        self.reloading_players.extend(other.reloading_players);
    }
}

#[derive(Debug)]
struct PlayerBody {
    body: BodyHandle,
    health: i32,
    ammo: u32,
    last_shot_tick: Option<u64>,
    last_reload_tick: Option<u64>,
}

impl PlayerBody {
    fn is_reloading(&self, tick: u64) -> bool {
        self.last_reload_tick
            .map_or(false, |reload| tick - reload < RELOAD_TIME_IN_TICKS)
    }

    fn is_cooling_down(&self, tick: u64) -> bool {
        self.last_shot_tick
            .map_or(false, |shot| tick - shot < MIN_SHOOTING_CYCLE_IN_TICKS)
    }
}

pub struct GameModel {
    physics: PhysicsWorld,
    config: GameModelConfig,
    walls: Vec<Wall>,
    players: BTreeMap<PlayerId, PlayerBody>,
    /// Live bullets, oldest first.
    bullets: VecDeque<BodyHandle>,
    killed_players: Vec<PlayerId>,
    spawned_players: Vec<PlayerId>,
    failed_to_spawn_players: Vec<PlayerId>,
    was_shot: bool,
    was_dry_fire: bool,
    was_reloading: bool,
    current_tick: u64,
}

impl GameModel {
    pub fn new(walls: Vec<Wall>, config: GameModelConfig) -> Self {
        let mut physics = PhysicsWorld::new();
        for wall in &walls {
            physics.add_wall(wall);
        }

        Self {
            physics,
            config,
            walls,
            players: BTreeMap::new(),
            bullets: VecDeque::new(),
            killed_players: Vec::new(),
            spawned_players: Vec::new(),
            failed_to_spawn_players: Vec::new(),
            was_shot: false,
            was_dry_fire: false,
            was_reloading: false,
            current_tick: 0,
        }
    }

    /// Runs one tick.
    ///
    /// An error means the world is in a state that no sequence of inputs
    /// should produce; the caller is expected to stop the simulation.
    pub fn next_step(&mut self, input: &StepInput) -> Result<(), GameError> {
        self.check_invariants()?;
        self.clear_outcomes();

        self.process_spawn_requests(&input.spawn_requests)?;
        for id in &input.players_to_remove {
            self.remove_player(*id);
        }
        self.process_move_actions(&input.move_actions)?;
        self.process_rotate_actions(&input.rotate_actions);
        self.process_shoot_actions(&input.shoot_actions)?;
        self.process_reloads(&input.reloading_players);

        let hits = self.physics.step();
        self.apply_bullet_hits(&hits);

        self.current_tick += 1;
        Ok(())
    }

    /// Verifies the body-count and ammo bounds.
    pub fn check_invariants(&self) -> Result<(), GameError> {
        let body_count = self.physics.body_count();
        let expected = self.players.len() + self.physics.wall_count() + self.bullets.len();
        trace!(
            "Tick {}: {} bodies, {} players, {} bullets",
            self.current_tick,
            body_count,
            self.players.len(),
            self.bullets.len()
        );

        if self.bullets.len() > MAX_BULLET_COUNT {
            return Err(GameError::InvariantViolated(format!(
                "{} live bullets exceed the cap of {}",
                self.bullets.len(),
                MAX_BULLET_COUNT
            )));
        }
        if body_count != expected {
            return Err(GameError::InvariantViolated(format!(
                "{} bodies in the world, expected {}",
                body_count, expected
            )));
        }
        if let Some((id, player)) = self
            .players
            .iter()
            .find(|(_, player)| player.ammo > self.config.magazine_size)
        {
            return Err(GameError::InvariantViolated(format!(
                "player {} holds {} rounds, magazine holds {}",
                id, player.ammo, self.config.magazine_size
            )));
        }
        Ok(())
    }

    fn clear_outcomes(&mut self) {
        self.killed_players.clear();
        self.spawned_players.clear();
        self.failed_to_spawn_players.clear();
        self.was_shot = false;
        self.was_dry_fire = false;
        self.was_reloading = false;
    }

    fn process_spawn_requests(
        &mut self,
        spawn_requests: &BTreeMap<PlayerId, Point>,
    ) -> Result<(), GameError> {
        for (&id, &point) in spawn_requests {
            if self.players.contains_key(&id) {
                warn!("Player {} requested a spawn while alive", id);
                continue;
            }

            if !self.is_spawn_point_free(point)? {
                debug!("Player {} failed to spawn at {:?}", id, point);
                self.failed_to_spawn_players.push(id);
                continue;
            }

            let body = self.physics.add_circle(
                BodyKind::Player(id),
                PLAYER_RADIUS,
                point,
                Vector2::ZERO,
            );
            self.players.insert(
                id,
                PlayerBody {
                    body,
                    health: MAX_HEALTH,
                    ammo: self.config.magazine_size,
                    last_shot_tick: None,
                    last_reload_tick: None,
                },
            );
            self.spawned_players.push(id);
            debug!("Player {} spawned at {:?}", id, point);
        }
        Ok(())
    }

    /// A point is free unless some living player both sees it and stands
    /// closer than the minimum spawn distance.
    fn is_spawn_point_free(&self, point: Point) -> Result<bool, GameError> {
        for player in self.players.values() {
            let position = self.body_position(player.body)?;
            if !self.physics.is_wall_between(point, position)
                && point.distance(&position) < self.config.min_spawn_distance
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn remove_player(&mut self, id: PlayerId) {
        match self.players.remove(&id) {
            Some(player) => {
                self.physics.remove_body(player.body);
                debug!("Player {} removed", id);
            }
            None => debug!("Player {} is already gone", id),
        }
    }

    fn process_move_actions(
        &mut self,
        move_actions: &BTreeMap<PlayerId, Vector2>,
    ) -> Result<(), GameError> {
        for (id, player) in &self.players {
            let velocity = self
                .physics
                .velocity(player.body)
                .ok_or_else(|| missing_body(*id))?;

            let force = match move_actions.get(id) {
                Some(direction) => {
                    let mut force = direction.normalize().scale(FORCE_SCALE);
                    if velocity.length() > MAX_SPEED {
                        let heading = velocity.normalize();
                        let forward = force.dot(&heading);
                        if forward > 0.0 {
                            force = force.sub(&heading.scale(forward));
                        }
                    }
                    force
                }
                None => velocity.scale(-BRAKING_FORCE),
            };
            self.physics.set_force(player.body, force);
        }
        Ok(())
    }

    fn process_rotate_actions(&mut self, rotate_actions: &BTreeMap<PlayerId, f32>) {
        for (id, &angle) in rotate_actions {
            if let Some(player) = self.players.get(id) {
                self.physics.set_angle(player.body, angle);
            }
        }
    }

    fn process_shoot_actions(
        &mut self,
        shoot_actions: &BTreeMap<PlayerId, Point>,
    ) -> Result<(), GameError> {
        let tick = self.current_tick;

        for (&id, target) in shoot_actions {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            if player.is_cooling_down(tick) {
                continue;
            }
            player.last_shot_tick = Some(tick);

            if player.ammo == 0 {
                self.was_dry_fire = true;
                continue;
            }
            if player.is_reloading(tick) {
                continue;
            }

            let position = self
                .physics
                .position(player.body)
                .ok_or_else(|| missing_body(id))?;
            let aim = target.sub(&position);
            if aim.length() < PLAYER_RADIUS {
                continue;
            }
            let aim = aim.normalize();

            let muzzle = position.add(&aim.scale(PLAYER_RADIUS + 3.0 * BULLET_RADIUS));
            let bullet = self.physics.add_circle(
                BodyKind::Bullet,
                BULLET_RADIUS,
                muzzle,
                aim.scale(self.config.bullet_speed),
            );
            self.bullets.push_back(bullet);
            if self.bullets.len() > MAX_BULLET_COUNT {
                if let Some(oldest) = self.bullets.pop_front() {
                    self.physics.remove_body(oldest);
                }
            }

            player.ammo -= 1;
            self.was_shot = true;
        }
        Ok(())
    }

    fn process_reloads(&mut self, reloading_players: &BTreeSet<PlayerId>) {
        let tick = self.current_tick;

        for id in reloading_players {
            let Some(player) = self.players.get_mut(id) else {
                continue;
            };
            if player.is_reloading(tick) {
                continue;
            }
            player.ammo = self.config.magazine_size;
            player.last_reload_tick = Some(tick);
            self.was_reloading = true;
        }
    }

    fn apply_bullet_hits(&mut self, hits: &[BulletHit]) {
        let mut impact_per_player: BTreeMap<PlayerId, f64> = BTreeMap::new();
        for hit in hits {
            *impact_per_player.entry(hit.player_id).or_default() +=
                f64::from(hit.squared_relative_velocity);

            if let Some(index) = self.bullets.iter().position(|b| *b == hit.bullet) {
                self.bullets.remove(index);
                self.physics.remove_body(hit.bullet);
            }
        }

        for (id, impact) in impact_per_player {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            player.health -= impact as i32 / DAMAGE_DIVISOR;
            if player.health < 0 {
                self.remove_player(id);
                self.killed_players.push(id);
                debug!("Player {} was killed", id);
            }
        }
    }

    fn body_position(&self, body: BodyHandle) -> Result<Point, GameError> {
        self.physics.position(body).ok_or_else(|| {
            GameError::InvariantViolated("living player without a physics body".to_string())
        })
    }

    fn living(&self, id: PlayerId) -> Result<&PlayerBody, GameError> {
        self.players.get(&id).ok_or(GameError::UnknownPlayer(id))
    }

    /// Public view of every living player, keyed by id.
    pub fn players(&self) -> Result<BTreeMap<PlayerId, Player>, GameError> {
        self.players
            .iter()
            .map(|(&id, player)| {
                let position = self.body_position(player.body)?;
                let velocity = self.physics.velocity(player.body).unwrap_or_default();
                let angle = self.physics.angle(player.body).unwrap_or_default();
                Ok((id, Player::new(position, velocity, angle, player.health)))
            })
            .collect()
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn bullet_positions(&self) -> Vec<Point> {
        self.bullets
            .iter()
            .filter_map(|bullet| self.physics.position(*bullet))
            .collect()
    }

    /// True when no wall lies between the two players' centres.
    pub fn is_on_line_of_sight(&self, first: PlayerId, second: PlayerId) -> Result<bool, GameError> {
        let from = self.body_position(self.living(first)?.body)?;
        let to = self.body_position(self.living(second)?.body)?;
        Ok(!self.physics.is_wall_between(from, to))
    }

    pub fn distance_between_players(
        &self,
        first: PlayerId,
        second: PlayerId,
    ) -> Result<f32, GameError> {
        let from = self.body_position(self.living(first)?.body)?;
        let to = self.body_position(self.living(second)?.body)?;
        Ok(from.distance(&to))
    }

    pub fn is_magazine_empty(&self, id: PlayerId) -> Result<bool, GameError> {
        Ok(self.living(id)?.ammo == 0)
    }

    pub fn ammo(&self, id: PlayerId) -> Result<u32, GameError> {
        Ok(self.living(id)?.ammo)
    }

    pub fn killed_players(&self) -> &[PlayerId] {
        &self.killed_players
    }

    pub fn spawned_players(&self) -> &[PlayerId] {
        &self.spawned_players
    }

    pub fn failed_to_spawn_players(&self) -> &[PlayerId] {
        &self.failed_to_spawn_players
    }

    pub fn was_shot(&self) -> bool {
        self.was_shot
    }

    pub fn was_dry_fire(&self) -> bool {
        self.was_dry_fire
    }

    pub fn was_reloading(&self) -> bool {
        self.was_reloading
    }

    pub fn body_count(&self) -> usize {
        self.physics.body_count()
    }

    pub fn bullet_count(&self) -> usize {
        self.bullets.len()
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Copies out what the network layer needs after a tick, so the model
    /// can be released before anything is sent.
    pub fn outcome(&self) -> Result<TickOutcome, GameError> {
        Ok(TickOutcome {
            tick: self.current_tick,
            players: self.players()?,
            walls: self.walls.clone(),
            bullets: self.bullet_positions(),
            killed_players: self.killed_players.clone(),
            spawned_players: self.spawned_players.clone(),
            failed_to_spawn_players: self.failed_to_spawn_players.clone(),
            was_shot: self.was_shot,
            was_dry_fire: self.was_dry_fire,
            was_reloading: self.was_reloading,
        })
    }
}

fn missing_body(id: PlayerId) -> GameError {
    GameError::InvariantViolated(format!("player {} has no physics body", id))
}

/// Detached copy of one tick's result.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub tick: u64,
    pub players: BTreeMap<PlayerId, Player>,
    pub walls: Vec<Wall>,
    pub bullets: Vec<Point>,
    pub killed_players: Vec<PlayerId>,
    pub spawned_players: Vec<PlayerId>,
    pub failed_to_spawn_players: Vec<PlayerId>,
    pub was_shot: bool,
    pub was_dry_fire: bool,
    pub was_reloading: bool,
}

impl TickOutcome {
    /// The snapshot as seen by `recipient`: their own player separated from
    /// everyone else.
    pub fn snapshot_for(&self, recipient: PlayerId) -> StateSnapshot {
        StateSnapshot {
            player: self.players.get(&recipient).cloned(),
            other_players: self
                .players
                .iter()
                .filter(|(id, _)| **id != recipient)
                .map(|(_, player)| player.clone())
                .collect(),
            walls: self.walls.clone(),
            bullets: self.bullets.clone(),
            was_dry_fire: self.was_dry_fire,
            was_reload: self.was_reloading,
            was_shot: self.was_shot,
            bullet_radius: BULLET_RADIUS,
            player_radius: PLAYER_RADIUS,
        }
    }
}
