//! Grid geometry, terrain, and movement legality.
//!
//! One cell spans 1.5 distance units; the Euclidean cell distance times
//! that scale is the canonical metric shared by movement budgets, attack
//! ranges, and spell areas.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::world::{EntityId, EntityKind, GameState};

/// Distance units per grid cell.
pub const METERS_PER_CELL: f32 = 1.5;

/// Movement budget fallbacks for entities without an explicit speed.
pub const DEFAULT_CHARACTER_SPEED: u32 = 9;
pub const DEFAULT_MONSTER_SPEED: u32 = 6;

/// An integer grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Distance between two cells in distance units.
pub fn distance(a: Position, b: Position) -> f32 {
    let dx = (a.x - b.x) as f32;
    let dy = (a.y - b.y) as f32;
    (dx * dx + dy * dy).sqrt() * METERS_PER_CELL
}

/// Static map features that shape movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    Wall,
    Door { open: bool },
    Difficult,
    Hazard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapElement {
    pub kind: TerrainKind,
    pub position: Position,
    pub description: Option<String>,
}

impl MapElement {
    pub fn wall(position: Position) -> Self {
        Self {
            kind: TerrainKind::Wall,
            position,
            description: None,
        }
    }

    pub fn door(position: Position, open: bool) -> Self {
        Self {
            kind: TerrainKind::Door { open },
            position,
            description: None,
        }
    }

    pub fn difficult(position: Position, description: impl Into<String>) -> Self {
        Self {
            kind: TerrainKind::Difficult,
            position,
            description: Some(description.into()),
        }
    }

    pub fn hazard(position: Position, description: impl Into<String>) -> Self {
        Self {
            kind: TerrainKind::Hazard,
            position,
            description: Some(description.into()),
        }
    }

    /// Whether this element stops an ordinary mover outright.
    pub fn blocks_movement(&self) -> bool {
        matches!(
            self.kind,
            TerrainKind::Wall | TerrainKind::Door { open: false }
        )
    }
}

/// Classification of the ground at a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Normal,
    Difficult,
    Hazard,
}

impl Terrain {
    pub fn name(&self) -> &'static str {
        match self {
            Terrain::Normal => "normal",
            Terrain::Difficult => "difficult",
            Terrain::Hazard => "hazard",
        }
    }

    /// Difficult and hazardous ground demand a skill check on entry.
    pub fn requires_check(&self) -> bool {
        !matches!(self, Terrain::Normal)
    }
}

impl fmt::Display for Terrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify the ground at `position`. Dungeon-master-controlled moves and
/// monsters are never slowed by terrain.
pub fn terrain_at(
    elements: &[MapElement],
    position: Position,
    kind: EntityKind,
    dungeon_master: bool,
) -> Terrain {
    if dungeon_master || kind == EntityKind::Monster {
        return Terrain::Normal;
    }
    match elements
        .iter()
        .find(|e| e.position == position)
        .map(|e| e.kind)
    {
        Some(TerrainKind::Difficult) => Terrain::Difficult,
        Some(TerrainKind::Hazard) => Terrain::Hazard,
        _ => Terrain::Normal,
    }
}

/// Why a move was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveViolation {
    OutOfBounds,
    TooFar { distance_tenths: u32, speed: u32 },
    Blocked,
    Occupied,
}

impl fmt::Display for MoveViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveViolation::OutOfBounds => write!(f, "destination is outside the map"),
            MoveViolation::TooFar {
                distance_tenths,
                speed,
            } => write!(
                f,
                "destination is {:.1} units away, beyond the {} unit movement range",
                *distance_tenths as f32 / 10.0,
                speed
            ),
            MoveViolation::Blocked => write!(f, "the way is blocked"),
            MoveViolation::Occupied => write!(f, "that space is occupied"),
        }
    }
}

/// Validate a move against bounds, speed, terrain blockers, and occupancy.
///
/// Walls and closed doors stop characters; monsters and dungeon-master
/// moves pass through them. The destination must not hold another living
/// entity.
pub fn validate_move(
    state: &GameState,
    id: EntityId,
    kind: EntityKind,
    to: Position,
    dungeon_master: bool,
) -> Result<(), MoveViolation> {
    let entity = match state.entity(id, kind) {
        Some(e) => e,
        None => return Err(MoveViolation::OutOfBounds),
    };

    if to.x < 0 || to.x >= state.grid_size || to.y < 0 || to.y >= state.grid_size {
        return Err(MoveViolation::OutOfBounds);
    }

    let travelled = distance(entity.core().position, to);
    let speed = entity.speed();
    if travelled > speed as f32 {
        return Err(MoveViolation::TooFar {
            distance_tenths: (travelled * 10.0).round() as u32,
            speed,
        });
    }

    let privileged = dungeon_master || kind == EntityKind::Monster;
    if !privileged
        && state
            .map_elements
            .iter()
            .any(|e| e.position == to && e.blocks_movement())
    {
        return Err(MoveViolation::Blocked);
    }

    if state.occupied_by_other(to, id) {
        return Err(MoveViolation::Occupied);
    }

    Ok(())
}
