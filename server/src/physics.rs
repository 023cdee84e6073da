//! rapier2d world wrapper used by the simulation core.
//!
//! Walls are fixed bodies with convex polygon colliders, players and bullets
//! are dynamic circles. Every collider carries a [`BodyKind`] tag in its user
//! data so contact events can be classified without a reverse lookup table.
//!
//! Contact callbacks only *record* player/bullet hits into a channel; nothing
//! in the world is mutated from inside the callback. The caller drains the
//! hits once [`PhysicsWorld::step`] returns.

use log::warn;
use rapier2d::crossbeam::channel::{unbounded, Sender};
use rapier2d::prelude::*;
use shared::{Point, Vector2, Wall, TIME_STEP};

pub type PlayerId = i32;
pub type BodyHandle = RigidBodyHandle;

/// What a collider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Wall,
    Player(PlayerId),
    Bullet,
}

const KIND_SHIFT: u32 = 64;

impl BodyKind {
    fn to_user_data(self) -> u128 {
        match self {
            BodyKind::Wall => 1u128 << KIND_SHIFT,
            BodyKind::Player(id) => (2u128 << KIND_SHIFT) | u128::from(id as u32),
            BodyKind::Bullet => 3u128 << KIND_SHIFT,
        }
    }

    fn from_user_data(data: u128) -> Option<Self> {
        match data >> KIND_SHIFT {
            1 => Some(BodyKind::Wall),
            2 => Some(BodyKind::Player(data as u32 as PlayerId)),
            3 => Some(BodyKind::Bullet),
            _ => None,
        }
    }
}

/// A bullet touching a player, as observed at the start of the contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletHit {
    pub player_id: PlayerId,
    pub bullet: BodyHandle,
    pub squared_relative_velocity: f32,
}

/// Forwards player/bullet contact starts into a channel.
struct ContactRecorder {
    hits: Sender<BulletHit>,
}

impl EventHandler for ContactRecorder {
    fn handle_collision_event(
        &self,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if !event.started() {
            return;
        }
        let (Some(first), Some(second)) = (
            colliders.get(event.collider1()),
            colliders.get(event.collider2()),
        ) else {
            return;
        };

        let (player_id, player, bullet) = match (
            BodyKind::from_user_data(first.user_data),
            BodyKind::from_user_data(second.user_data),
        ) {
            (Some(BodyKind::Player(id)), Some(BodyKind::Bullet)) => (id, first, second),
            (Some(BodyKind::Bullet), Some(BodyKind::Player(id))) => (id, second, first),
            _ => return,
        };

        let (Some(player_handle), Some(bullet_handle)) = (player.parent(), bullet.parent()) else {
            return;
        };
        let (Some(player_body), Some(bullet_body)) =
            (bodies.get(player_handle), bodies.get(bullet_handle))
        else {
            return;
        };

        let relative_velocity = player_body.linvel() - bullet_body.linvel();
        // The receiver outlives the step, so a send cannot fail here.
        let _ = self.hits.send(BulletHit {
            player_id,
            bullet: bullet_handle,
            squared_relative_velocity: relative_velocity.norm_squared(),
        });
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Zero-gravity rigid-body world with a fixed timestep.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    wall_colliders: Vec<ColliderHandle>,
    wall_count: usize,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let integration_params = IntegrationParameters {
            dt: TIME_STEP,
            ..IntegrationParameters::default()
        };

        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, 0.0],
            integration_params,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            wall_colliders: Vec::new(),
            wall_count: 0,
        }
    }

    /// Adds an immovable polygon. Vertices are relative to `wall.position`.
    pub fn add_wall(&mut self, wall: &Wall) -> BodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![wall.position.x, wall.position.y])
            .build();
        let handle = self.bodies.insert(body);
        self.wall_count += 1;

        let vertices: Vec<rapier2d::math::Point<Real>> =
            wall.points.iter().map(|p| point![p.x, p.y]).collect();
        if vertices.len() < 2 {
            warn!("Wall at {:?} has fewer than two vertices, no collider created", wall.position);
            return handle;
        }

        let builder = ColliderBuilder::convex_hull(&vertices).unwrap_or_else(|| {
            warn!("Wall at {:?} is degenerate, using its outline", wall.position);
            let mut outline = vertices.clone();
            outline.push(vertices[0]);
            ColliderBuilder::polyline(outline, None)
        });
        let collider = builder
            .density(1.0)
            .user_data(BodyKind::Wall.to_user_data())
            .build();
        let collider_handle =
            self.colliders
                .insert_with_parent(collider, handle, &mut self.bodies);
        self.wall_colliders.push(collider_handle);

        handle
    }

    /// Adds a dynamic circle. Player circles never rotate from contacts.
    pub fn add_circle(
        &mut self,
        kind: BodyKind,
        radius: f32,
        position: Point,
        velocity: Vector2,
    ) -> BodyHandle {
        let mut builder = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y])
            .linvel(vector![velocity.x, velocity.y]);
        builder = match kind {
            BodyKind::Player(_) => builder.lock_rotations(),
            BodyKind::Bullet => builder.ccd_enabled(true),
            BodyKind::Wall => builder,
        };
        let handle = self.bodies.insert(builder.build());

        let collider = ColliderBuilder::ball(radius)
            .density(1.0)
            .user_data(kind.to_user_data())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    /// Removes a body with its colliders. Unknown handles are ignored.
    pub fn remove_body(&mut self, handle: BodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Point> {
        self.bodies.get(handle).map(|body| {
            let translation = body.translation();
            Point::new(translation.x, translation.y)
        })
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<Vector2> {
        self.bodies.get(handle).map(|body| {
            let linvel = body.linvel();
            Vector2::new(linvel.x, linvel.y)
        })
    }

    pub fn angle(&self, handle: BodyHandle) -> Option<f32> {
        self.bodies.get(handle).map(|body| body.rotation().angle())
    }

    pub fn set_angle(&mut self, handle: BodyHandle, angle: f32) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_rotation(Rotation::new(angle), true);
        }
    }

    /// Replaces the force acting on the body during the next step.
    pub fn set_force(&mut self, handle: BodyHandle, force: Vector2) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.reset_forces(true);
            body.add_force(vector![force.x, force.y], true);
        }
    }

    /// True if any wall intersects the segment `from`..`to`.
    pub fn is_wall_between(&self, from: Point, to: Point) -> bool {
        let direction = to.sub(&from);
        let ray = Ray::new(point![from.x, from.y], vector![direction.x, direction.y]);

        self.wall_colliders
            .iter()
            .filter_map(|handle| self.colliders.get(*handle))
            .any(|collider| collider.shape().intersects_ray(collider.position(), &ray, 1.0))
    }

    /// Advances the world by one fixed timestep and returns the bullet hits
    /// that started during it, ordered by player id.
    pub fn step(&mut self) -> Vec<BulletHit> {
        let (hit_send, hit_recv) = unbounded();
        let recorder = ContactRecorder { hits: hit_send };

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &recorder,
        );

        let mut hits: Vec<BulletHit> = hit_recv.try_iter().collect();
        hits.sort_by_key(|hit| (hit.player_id, hit.bullet.into_raw_parts()));
        hits
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn wall_count(&self) -> usize {
        self.wall_count
    }
}
