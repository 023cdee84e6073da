//! Bot controller.
//!
//! Bots are ordinary players with negative ids whose intents are produced
//! here instead of read from a socket. Each tick a dead bot asks to respawn
//! somewhere in the spawn area. A living bot keeps wandering in its current
//! direction until that direction's duration runs out, and fires at a random
//! visible player within vision range, leading the shot by the target's
//! velocity.

use crate::game::{GameError, GameModel, StepInput};
use crate::lead::LeadCalculator;
use crate::physics::PlayerId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Point, Vector2, TICKS_PER_SECOND};
use std::collections::BTreeMap;

pub const VISION_DISTANCE: f32 = 30.0;
/// Upper bound, exclusive, on how long a bot keeps one direction.
pub const MAX_MOVEMENT_TICKS: u32 = 3 * TICKS_PER_SECOND;

/// Axis-aligned rectangle bots spawn in and wander back towards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnArea {
    x_min: f32,
    x_max: f32,
    y_min: f32,
    y_max: f32,
}

impl SpawnArea {
    /// # Panics
    ///
    /// Panics if the rectangle is empty along either axis.
    pub fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> Self {
        assert!(x_max > x_min && y_max > y_min, "spawn area must not be empty");
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn random_point<R: Rng>(&self, rng: &mut R) -> Point {
        Point::new(
            rng.gen_range(self.x_min..self.x_max),
            rng.gen_range(self.y_min..self.y_max),
        )
    }

    /// Strictly inside, the border does not count.
    pub fn contains(&self, point: Point) -> bool {
        point.x > self.x_min && point.x < self.x_max && point.y > self.y_min && point.y < self.y_max
    }
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self::new(-50.0, 50.0, -50.0, 50.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Movement {
    direction: Vector2,
    remaining_ticks: u32,
}

pub struct AiEngine {
    bot_ids: Vec<PlayerId>,
    spawn_area: SpawnArea,
    lead: LeadCalculator,
    movements: BTreeMap<PlayerId, Movement>,
    rng: StdRng,
}

impl AiEngine {
    /// Bots get ids `-1` down to `-bot_count`.
    pub fn new(bot_count: u32, spawn_area: SpawnArea, bullet_speed: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            bot_ids: (1..=bot_count as PlayerId).map(|n| -n).collect(),
            spawn_area,
            lead: LeadCalculator::new(bullet_speed),
            movements: BTreeMap::new(),
            rng,
        }
    }

    pub fn bot_ids(&self) -> &[PlayerId] {
        &self.bot_ids
    }

    /// Intents for every bot for the coming tick.
    pub fn compute_next_step(&mut self, model: &GameModel) -> Result<StepInput, GameError> {
        let mut input = StepInput::default();
        let players = model.players()?;

        for id in self.bot_ids.clone() {
            let Some(bot) = players.get(&id) else {
                self.movements.remove(&id);
                let point = self.spawn_area.random_point(&mut self.rng);
                input.spawn_requests.insert(id, point);
                continue;
            };

            let current = match self.movements.get_mut(&id) {
                Some(movement) if movement.remaining_ticks > 0 => {
                    movement.remaining_ticks -= 1;
                    Some(movement.direction)
                }
                _ => None,
            };
            let direction = match current {
                Some(direction) => direction,
                None => {
                    let movement = self.choose_movement(bot.position);
                    self.movements.insert(id, movement);
                    movement.direction
                }
            };
            input.move_actions.insert(id, direction);

            let mut visible = Vec::new();
            for (&other, _) in players.iter().filter(|(other, _)| **other != id) {
                if model.distance_between_players(id, other)? < VISION_DISTANCE
                    && model.is_on_line_of_sight(id, other)?
                {
                    visible.push(other);
                }
            }
            if visible.is_empty() {
                continue;
            }

            let target = &players[&visible[self.rng.gen_range(0..visible.len())]];
            let Some(aim) = self
                .lead
                .collision_point(bot.position, target.position, target.velocity)
            else {
                continue;
            };

            input.rotate_actions.insert(id, aim.sub(&bot.position).angle());
            if model.is_magazine_empty(id)? {
                input.reloading_players.insert(id);
            } else {
                input.shoot_actions.insert(id, aim);
            }
        }

        Ok(input)
    }

    /// Picks a new heading. Outside the spawn area the heading points back
    /// into it.
    fn choose_movement(&mut self, position: Point) -> Movement {
        let direction = if self.spawn_area.contains(position) {
            Vector2::new(self.rng.gen::<f32>() - 0.5, self.rng.gen::<f32>() - 0.5)
        } else {
            self.spawn_area.random_point(&mut self.rng).sub(&position)
        };

        Movement {
            direction,
            remaining_ticks: self.rng.gen_range(0..MAX_MOVEMENT_TICKS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameModelConfig;
    use shared::Wall;

    fn engine(bot_count: u32) -> AiEngine {
        AiEngine::new(bot_count, SpawnArea::default(), 25.0, Some(11))
    }

    fn model_with(walls: Vec<Wall>, magazine_size: u32, spawns: &[(PlayerId, Point)]) -> GameModel {
        let mut model = GameModel::new(
            walls,
            GameModelConfig {
                magazine_size,
                ..GameModelConfig::default()
            },
        );
        let mut input = StepInput::default();
        input.spawn_requests.extend(spawns.iter().copied());
        model.next_step(&input).unwrap();
        assert_eq!(model.spawned_players().len(), spawns.len());
        model
    }

    #[test]
    fn test_spawn_area_contains_is_strict() {
        let area = SpawnArea::new(0.0, 10.0, 0.0, 10.0);
        assert!(area.contains(Point::new(5.0, 5.0)));
        assert!(!area.contains(Point::new(0.0, 5.0)));
        assert!(!area.contains(Point::new(5.0, 10.0)));
        assert!(!area.contains(Point::new(11.0, 5.0)));
    }

    #[test]
    fn test_random_point_inside_area() {
        let area = SpawnArea::new(-2.0, 2.0, 10.0, 12.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let point = area.random_point(&mut rng);
            assert!(point.x >= -2.0 && point.x < 2.0);
            assert!(point.y >= 10.0 && point.y < 12.0);
        }
    }

    #[test]
    fn test_bot_ids_are_negative() {
        assert_eq!(engine(3).bot_ids(), &[-1, -2, -3]);
    }

    #[test]
    fn test_dead_bots_request_spawn() {
        let model = GameModel::new(Vec::new(), GameModelConfig::default());
        let mut ai = engine(2);

        let input = ai.compute_next_step(&model).unwrap();
        assert_eq!(input.spawn_requests.len(), 2);
        for point in input.spawn_requests.values() {
            assert!(point.x >= -50.0 && point.x < 50.0);
            assert!(point.y >= -50.0 && point.y < 50.0);
        }
        assert!(input.move_actions.is_empty());
        assert!(input.shoot_actions.is_empty());
    }

    #[test]
    fn test_bot_shoots_visible_player() {
        let model = model_with(Vec::new(), 10, &[(-1, Point::new(0.0, 0.0)), (0, Point::new(10.0, 0.0))]);
        let mut ai = engine(1);

        let input = ai.compute_next_step(&model).unwrap();
        assert!(input.spawn_requests.is_empty());
        assert!(input.move_actions.contains_key(&-1));
        let aim = input.shoot_actions[&-1];
        assert!((aim.x - 10.0).abs() < 0.5);
        assert!(aim.y.abs() < 0.5);
        assert!(input.rotate_actions[&-1].abs() < 0.1);
        assert!(input.reloading_players.is_empty());
    }

    #[test]
    fn test_bot_reloads_empty_magazine() {
        let model = model_with(Vec::new(), 0, &[(-1, Point::new(0.0, 0.0)), (0, Point::new(10.0, 0.0))]);
        let mut ai = engine(1);

        let input = ai.compute_next_step(&model).unwrap();
        assert!(input.shoot_actions.is_empty());
        assert!(input.reloading_players.contains(&-1));
        assert!(input.rotate_actions.contains_key(&-1));
    }

    #[test]
    fn test_bot_ignores_distant_player() {
        let model = model_with(Vec::new(), 10, &[(-1, Point::new(0.0, 0.0)), (0, Point::new(40.0, 0.0))]);
        let mut ai = engine(1);

        let input = ai.compute_next_step(&model).unwrap();
        assert!(input.shoot_actions.is_empty());
        assert!(input.rotate_actions.is_empty());
    }

    #[test]
    fn test_bot_ignores_player_behind_wall() {
        let walls = vec![Wall::rect(Point::new(5.0, 0.0), 0.5, 10.0)];
        let model = model_with(walls, 10, &[(-1, Point::new(0.0, 0.0)), (0, Point::new(10.0, 0.0))]);
        let mut ai = engine(1);

        let input = ai.compute_next_step(&model).unwrap();
        assert!(input.shoot_actions.is_empty());
        assert!(input.reloading_players.is_empty());
    }

    #[test]
    fn test_bot_outside_area_heads_back() {
        let model = model_with(Vec::new(), 10, &[(-1, Point::new(80.0, 0.0))]);
        let mut ai = engine(1);

        let input = ai.compute_next_step(&model).unwrap();
        assert!(input.move_actions[&-1].x < 0.0);
    }

    #[test]
    fn test_movement_is_kept_while_duration_lasts() {
        let model = model_with(Vec::new(), 10, &[(-1, Point::new(0.0, 0.0))]);
        let mut ai = engine(1);

        let first = ai.compute_next_step(&model).unwrap().move_actions[&-1];
        let remaining = ai.movements[&-1].remaining_ticks;
        for _ in 0..remaining {
            assert_eq!(ai.compute_next_step(&model).unwrap().move_actions[&-1], first);
        }
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let model = GameModel::new(Vec::new(), GameModelConfig::default());
        let first = engine(3).compute_next_step(&model).unwrap();
        let second = engine(3).compute_next_step(&model).unwrap();
        assert_eq!(first.spawn_requests, second.spawn_requests);
    }
}
