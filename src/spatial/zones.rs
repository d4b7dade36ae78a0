use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::blueprint::{GridPos, RoomBlueprint};

/// Cells (Chebyshev) around a door that count as the entrance
const ENTRANCE_RADIUS: i32 = 2;

/// A named coarse region of a room.
///
/// North is the low-z side of the grid, west the low-x side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Zone {
    Entrance,
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Zone {
    pub const ALL: [Zone; 10] = [
        Zone::Entrance,
        Zone::NorthWest,
        Zone::North,
        Zone::NorthEast,
        Zone::West,
        Zone::Center,
        Zone::East,
        Zone::SouthWest,
        Zone::South,
        Zone::SouthEast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Entrance => "entrance",
            Zone::NorthWest => "north-west",
            Zone::North => "north",
            Zone::NorthEast => "north-east",
            Zone::West => "west",
            Zone::Center => "center",
            Zone::East => "east",
            Zone::SouthWest => "south-west",
            Zone::South => "south",
            Zone::SouthEast => "south-east",
        }
    }

    /// Column/row of a 3x3 region, `None` for the entrance
    fn region(&self) -> Option<(usize, usize)> {
        match self {
            Zone::Entrance => None,
            Zone::NorthWest => Some((0, 0)),
            Zone::North => Some((1, 0)),
            Zone::NorthEast => Some((2, 0)),
            Zone::West => Some((0, 1)),
            Zone::Center => Some((1, 1)),
            Zone::East => Some((2, 1)),
            Zone::SouthWest => Some((0, 2)),
            Zone::South => Some((1, 2)),
            Zone::SouthEast => Some((2, 2)),
        }
    }

    fn from_region(col: usize, row: usize) -> Zone {
        match (col, row) {
            (0, 0) => Zone::NorthWest,
            (1, 0) => Zone::North,
            (2, 0) => Zone::NorthEast,
            (0, 1) => Zone::West,
            (2, 1) => Zone::East,
            (0, 2) => Zone::SouthWest,
            (1, 2) => Zone::South,
            (2, 2) => Zone::SouthEast,
            _ => Zone::Center,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        let normalized = match normalized.as_str() {
            "northwest" => "north-west",
            "northeast" => "north-east",
            "southwest" => "south-west",
            "southeast" => "south-east",
            "centre" | "middle" => "center",
            "door" | "entry" => "entrance",
            other => other,
        }
        .to_string();
        Zone::ALL
            .into_iter()
            .find(|zone| zone.as_str() == normalized)
            .ok_or_else(|| format!("unknown zone '{}'", s))
    }
}

/// Third of an axis a coordinate falls in (0, 1 or 2)
fn third(value: i32, size: i32) -> usize {
    if size <= 0 {
        return 1;
    }
    ((value.clamp(0, size - 1) * 3) / size) as usize
}

/// Partition a grid position into a named zone.
///
/// Pure function of the grid geometry: cells near a door are the entrance,
/// everything else falls into a 3x3 split of the room.
pub fn grid_to_zone(pos: GridPos, width: i32, depth: i32, doors: &[GridPos]) -> Zone {
    if doors.iter().any(|door| door.chebyshev_to(&pos) <= ENTRANCE_RADIUS) {
        return Zone::Entrance;
    }
    Zone::from_region(third(pos.x, width), third(pos.z, depth))
}

/// A walkable cell standing in for a zone as a navigation target.
///
/// For regions this is the walkable cell nearest the region's middle;
/// for the entrance it is the walkable cell nearest the first door.
pub fn zone_anchor(blueprint: &RoomBlueprint, zone: Zone) -> Option<GridPos> {
    let (w, d) = (blueprint.grid_width, blueprint.grid_depth);
    match zone.region() {
        None => {
            let door = *blueprint.doors.first()?;
            nearest_walkable(blueprint, door, |_| true)
        }
        Some((col, row)) => {
            let (col, row) = (col as i32, row as i32);
            let x0 = (col * w) / 3;
            let x1 = ((col + 1) * w) / 3;
            let z0 = (row * d) / 3;
            let z1 = ((row + 1) * d) / 3;
            let seed = GridPos::new((x0 + x1 - 1) / 2, (z0 + z1 - 1) / 2);
            nearest_walkable(blueprint, seed, |p| {
                grid_to_zone(p, w, d, &blueprint.doors) == zone
            })
        }
    }
}

/// The walkable cell closest to `seed` (clamped into the grid)
pub fn nearest_walkable_cell(blueprint: &RoomBlueprint, seed: GridPos) -> Option<GridPos> {
    let seed = GridPos::new(
        seed.x.clamp(0, (blueprint.grid_width - 1).max(0)),
        seed.z.clamp(0, (blueprint.grid_depth - 1).max(0)),
    );
    nearest_walkable(blueprint, seed, |_| true)
}

/// Breadth-first ring search for the closest walkable cell matching `accept`
fn nearest_walkable(
    blueprint: &RoomBlueprint,
    seed: GridPos,
    accept: impl Fn(GridPos) -> bool,
) -> Option<GridPos> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(seed);
    queue.push_back(seed);

    while let Some(pos) = queue.pop_front() {
        if blueprint.is_walkable(pos) && accept(pos) {
            return Some(pos);
        }
        for (dx, dz) in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
            let next = pos.offset(dx, dz);
            if blueprint.in_bounds(next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_by_three_partition() {
        let doors: [GridPos; 0] = [];
        assert_eq!(grid_to_zone(GridPos::new(1, 1), 12, 12, &doors), Zone::NorthWest);
        assert_eq!(grid_to_zone(GridPos::new(6, 6), 12, 12, &doors), Zone::Center);
        assert_eq!(grid_to_zone(GridPos::new(10, 6), 12, 12, &doors), Zone::East);
        assert_eq!(grid_to_zone(GridPos::new(6, 11), 12, 12, &doors), Zone::South);
        assert_eq!(grid_to_zone(GridPos::new(11, 0), 12, 12, &doors), Zone::NorthEast);
    }

    #[test]
    fn test_entrance_overrides_region() {
        let doors = [GridPos::new(0, 6)];
        assert_eq!(grid_to_zone(GridPos::new(2, 5), 12, 12, &doors), Zone::Entrance);
        assert_eq!(grid_to_zone(GridPos::new(3, 5), 12, 12, &doors), Zone::West);
    }

    #[test]
    fn test_parse_zone_names() {
        assert_eq!("north-west".parse::<Zone>(), Ok(Zone::NorthWest));
        assert_eq!("SouthEast".parse::<Zone>(), Ok(Zone::SouthEast));
        assert_eq!("centre".parse::<Zone>(), Ok(Zone::Center));
        assert!("attic".parse::<Zone>().is_err());
    }

    #[test]
    fn test_zone_anchor_is_walkable_and_in_zone() {
        let mut bp = RoomBlueprint::walled("Zones", 12, 12, 1.0);
        bp.doors.push(GridPos::new(0, 6));
        for zone in Zone::ALL {
            let anchor = zone_anchor(&bp, zone).unwrap();
            assert!(bp.is_walkable(anchor), "{} anchor not walkable", zone);
            assert_eq!(grid_to_zone(anchor, 12, 12, &bp.doors), zone);
        }
    }

    #[test]
    fn test_entrance_anchor_needs_a_door() {
        let bp = RoomBlueprint::walled("Zones", 8, 8, 1.0);
        assert_eq!(zone_anchor(&bp, Zone::Entrance), None);
    }

    #[test]
    fn test_nearest_walkable_cell_clamps_seed() {
        let bp = RoomBlueprint::walled("Zones", 8, 8, 1.0);
        assert_eq!(nearest_walkable_cell(&bp, GridPos::new(3, 3)), Some(GridPos::new(3, 3)));
        assert_eq!(nearest_walkable_cell(&bp, GridPos::new(-5, 3)), Some(GridPos::new(1, 3)));
    }
}
