//! Wall layouts.
//!
//! A map file is TOML with one `[[walls]]` table per wall:
//!
//! ```toml
//! [[walls]]
//! position = { x = 0.0, y = 0.0 }
//! points = [{ x = -1.0, y = -1.0 }, { x = 1.0, y = -1.0 }, { x = 0.0, y = 1.0 }]
//! ```
//!
//! `points` are the vertices of a convex polygon relative to `position`.

use serde::Deserialize;
use shared::{Point, Wall};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Half the side of the square enclosed by the border walls.
pub const ARENA_HALF_SIZE: f32 = 60.0;
const BORDER_THICKNESS: f32 = 1.0;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse map file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("wall {0} does not enclose any area")]
    DegenerateWall(usize),
}

#[derive(Debug, Deserialize)]
struct MapFile {
    #[serde(default)]
    walls: Vec<Wall>,
}

pub fn load_walls(path: &Path) -> Result<Vec<Wall>, MapError> {
    let contents = fs::read_to_string(path)?;
    parse_walls(&contents)
}

pub fn parse_walls(contents: &str) -> Result<Vec<Wall>, MapError> {
    let map: MapFile = toml::from_str(contents)?;
    for (index, wall) in map.walls.iter().enumerate() {
        if polygon_area(&wall.points).abs() <= f32::EPSILON {
            return Err(MapError::DegenerateWall(index));
        }
    }
    Ok(map.walls)
}

/// Signed shoelace area. Zero for fewer than three vertices.
fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: f32 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice_area / 2.0
}

/// Closed square arena with a few blocks for cover.
pub fn default_arena() -> Vec<Wall> {
    let outer = ARENA_HALF_SIZE + BORDER_THICKNESS;
    let mut walls = vec![
        Wall::rect(Point::new(0.0, outer), outer, BORDER_THICKNESS),
        Wall::rect(Point::new(0.0, -outer), outer, BORDER_THICKNESS),
        Wall::rect(Point::new(outer, 0.0), BORDER_THICKNESS, outer),
        Wall::rect(Point::new(-outer, 0.0), BORDER_THICKNESS, outer),
    ];

    walls.push(Wall::rect(Point::new(0.0, 0.0), 4.0, 4.0));
    for (x, y) in [(-25.0, -25.0), (25.0, -25.0), (-25.0, 25.0), (25.0, 25.0)] {
        walls.push(Wall::rect(Point::new(x, y), 6.0, 1.5));
    }
    walls.push(Wall::new(
        Point::new(0.0, 35.0),
        vec![Point::new(-5.0, -3.0), Point::new(5.0, -3.0), Point::new(0.0, 3.0)],
    ));
    walls.push(Wall::new(
        Point::new(0.0, -35.0),
        vec![Point::new(-5.0, 3.0), Point::new(0.0, -3.0), Point::new(5.0, 3.0)],
    ));
    walls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_walls() {
        let contents = r#"
            [[walls]]
            position = { x = 10.0, y = -5.0 }
            points = [{ x = -1.0, y = -1.0 }, { x = 1.0, y = -1.0 }, { x = 0.0, y = 1.0 }]

            [[walls]]
            position = { x = 0.0, y = 0.0 }
            points = [{ x = 0.0, y = 0.0 }, { x = 2.0, y = 0.0 }, { x = 2.0, y = 2.0 }, { x = 0.0, y = 2.0 }]
        "#;

        let walls = parse_walls(contents).unwrap();
        assert_eq!(walls.len(), 2);
        assert_eq!(walls[0].position, Point::new(10.0, -5.0));
        assert_eq!(walls[0].points.len(), 3);
        assert_eq!(walls[1].points[2], Point::new(2.0, 2.0));
    }

    #[test]
    fn test_empty_map() {
        assert!(parse_walls("").unwrap().is_empty());
    }

    #[test]
    fn test_degenerate_wall_is_rejected() {
        let contents = r#"
            [[walls]]
            position = { x = 0.0, y = 0.0 }
            points = [{ x = 0.0, y = 0.0 }, { x = 1.0, y = 1.0 }, { x = 2.0, y = 2.0 }]
        "#;
        assert!(matches!(parse_walls(contents), Err(MapError::DegenerateWall(0))));
    }

    #[test]
    fn test_malformed_map() {
        assert!(matches!(parse_walls("walls = 3"), Err(MapError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_walls(Path::new("/nonexistent/arena.toml"));
        assert!(matches!(result, Err(MapError::Io(_))));
    }

    #[test]
    fn test_default_arena_is_valid() {
        let walls = default_arena();
        assert!(walls.len() > 4);
        for wall in &walls {
            assert!(polygon_area(&wall.points).abs() > 0.0);
        }
    }

    #[test]
    fn test_polygon_area() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        assert_eq!(polygon_area(&square), 4.0);
        assert_eq!(polygon_area(&square[..2]), 0.0);
    }
}
