use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use super::{BlueprintError, CellType, GridCell, GridPos, RoomBlueprint, WorldPos};

const MAX_GRID_SIZE: i32 = 40;
const MIN_GRID_SIZE: i32 = 4;

const VALID_INTERACTION_TYPES: [&str; 3] = ["work", "coffee", "sleep"];

/// Flat decor: furniture for vision, but bots walk over it
const FLAT_PROPS: [&str; 2] = ["rug", "rug-large"];

/// Built-in prop catalogue. Unknown ids only warn, mods add their own.
const KNOWN_PROP_IDS: &[&str] = &[
    // Furniture
    "desk-with-monitor", "desk-with-dual-monitors", "desk-small", "desk-large",
    "conference-table", "round-table", "chair", "office-chair", "couch",
    "couch-l-shaped", "bookshelf", "bookshelf-tall", "filing-cabinet", "locker",
    "wardrobe", "bed", "bunk-bed", "workbench", "standing-desk",
    // Tech
    "server-rack", "monitor-wall", "projector-screen", "cable-mess",
    "satellite-dish", "antenna", "router-hub",
    // Decoration
    "plant", "plant-large", "plant-hanging", "flower-pot", "lamp", "lamp-floor",
    "lamp-desk", "ceiling-light", "rug", "rug-large", "painting", "notice-board",
    "whiteboard", "clock", "trophy", "globe",
    // Kitchen / break
    "coffee-machine", "water-cooler", "vending-machine", "fridge", "microwave",
    // Interaction markers
    "work-point", "work-point-1", "work-point-2", "work-point-3", "work-point-4",
    "coffee-point", "sleep-corner",
];

/// A point on the blueprint grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlueprintPoint {
    pub x: i32,
    pub z: i32,
}

/// Footprint of a multi-cell placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementSpan {
    #[serde(default = "one")]
    pub w: i32,
    #[serde(default = "one")]
    pub d: i32,
}

fn one() -> i32 {
    1
}

fn default_cell_size() -> f64 {
    0.6
}

/// A single prop placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintPlacement {
    pub prop_id: String,
    pub x: i32,
    pub z: i32,
    #[serde(default, rename = "type")]
    pub placement_type: Option<String>,
    #[serde(default)]
    pub interaction_type: Option<String>,
    #[serde(default)]
    pub span: Option<PlacementSpan>,
}

impl BlueprintPlacement {
    fn span_dims(&self) -> (i32, i32) {
        self.span.map(|s| (s.w, s.d)).unwrap_or((1, 1))
    }

    fn is_interaction(&self) -> bool {
        self.placement_type.as_deref() == Some("interaction")
    }
}

/// A door on the room's wall edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintDoor {
    pub x: i32,
    pub z: i32,
    #[serde(default)]
    pub facing: Option<String>,
}

/// Interaction points grouped by type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionPoints {
    #[serde(default)]
    pub work: Vec<BlueprintPoint>,
    #[serde(default)]
    pub coffee: Vec<BlueprintPoint>,
    #[serde(default)]
    pub sleep: Vec<BlueprintPoint>,
}

/// Authoring format of a room, as exchanged with the room editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintJson {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub grid_width: i32,
    pub grid_depth: i32,
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    #[serde(default)]
    pub placements: Vec<BlueprintPlacement>,
    #[serde(default)]
    pub doors: Vec<BlueprintDoor>,
    #[serde(default)]
    pub door_positions: Vec<BlueprintDoor>,
    pub walkable_center: BlueprintPoint,
    #[serde(default)]
    pub interaction_points: Option<InteractionPoints>,
}

impl BlueprintJson {
    pub fn from_json(text: &str) -> Result<Self, BlueprintError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BlueprintError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check the blueprint, returning `(errors, warnings)`.
    /// An empty error list means the blueprint can be compiled.
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&self.grid_width) {
            errors.push(format!(
                "gridWidth must be between {} and {}, got {}",
                MIN_GRID_SIZE, MAX_GRID_SIZE, self.grid_width
            ));
        }
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&self.grid_depth) {
            errors.push(format!(
                "gridDepth must be between {} and {}, got {}",
                MIN_GRID_SIZE, MAX_GRID_SIZE, self.grid_depth
            ));
        }

        if self.doors.is_empty() && self.door_positions.is_empty() {
            errors.push("Blueprint must have at least one door".to_string());
        }

        let center = self.walkable_center;
        if center.x < 0 || center.x >= self.grid_width {
            errors.push(format!(
                "walkableCenter.x ({}) out of grid bounds (0-{})",
                center.x,
                self.grid_width - 1
            ));
        }
        if center.z < 0 || center.z >= self.grid_depth {
            errors.push(format!(
                "walkableCenter.z ({}) out of grid bounds (0-{})",
                center.z,
                self.grid_depth - 1
            ));
        }

        let mut occupied: HashMap<(i32, i32), &str> = HashMap::new();
        for (i, p) in self.placements.iter().enumerate() {
            if p.x < 0 || p.x >= self.grid_width || p.z < 0 || p.z >= self.grid_depth {
                errors.push(format!(
                    "Placement [{}] propId='{}' at ({},{}) is out of grid bounds",
                    i, p.prop_id, p.x, p.z
                ));
                continue;
            }

            let (span_w, span_d) = p.span_dims();
            if p.x + span_w > self.grid_width {
                errors.push(format!(
                    "Placement [{}] propId='{}' span exceeds grid width at x={}, span.w={}",
                    i, p.prop_id, p.x, span_w
                ));
            }
            if p.z + span_d > self.grid_depth {
                errors.push(format!(
                    "Placement [{}] propId='{}' span exceeds grid depth at z={}, span.d={}",
                    i, p.prop_id, p.z, span_d
                ));
            }

            if !p.is_interaction() {
                for dx in 0..span_w {
                    for dz in 0..span_d {
                        let cell = (p.x + dx, p.z + dz);
                        if let Some(other) = occupied.get(&cell) {
                            errors.push(format!(
                                "Placement [{}] propId='{}' overlaps with '{}' at cell ({}, {})",
                                i, p.prop_id, other, cell.0, cell.1
                            ));
                        } else {
                            occupied.insert(cell, &p.prop_id);
                        }
                    }
                }
            }

            if !KNOWN_PROP_IDS.contains(&p.prop_id.as_str()) {
                warnings.push(format!(
                    "Unknown propId '{}' in placement [{}] (may be from a mod)",
                    p.prop_id, i
                ));
            }

            if let Some(kind) = &p.interaction_type {
                if !VALID_INTERACTION_TYPES.contains(&kind.as_str()) {
                    errors.push(format!(
                        "Placement [{}] has unknown interactionType '{}'. Valid: {:?}",
                        i, kind, VALID_INTERACTION_TYPES
                    ));
                }
            }
        }

        for (label, list) in [("doors", &self.doors), ("doorPositions", &self.door_positions)] {
            for (i, door) in list.iter().enumerate() {
                let on_edge = door.x == 0
                    || door.x == self.grid_width - 1
                    || door.z == 0
                    || door.z == self.grid_depth - 1;
                if !on_edge {
                    errors.push(format!(
                        "{}[{}] at ({},{}) must be on a wall edge (x=0, x={}, z=0, or z={})",
                        label,
                        i,
                        door.x,
                        door.z,
                        self.grid_width - 1,
                        self.grid_depth - 1
                    ));
                }
            }
        }

        if !self.doors.is_empty()
            && !self.door_positions.is_empty()
            && self.doors.len() != self.door_positions.len()
        {
            warnings.push(format!(
                "doors ({} entries) and doorPositions ({} entries) have different counts",
                self.doors.len(),
                self.door_positions.len()
            ));
        }

        (errors, warnings)
    }

    /// Validate and build the runtime grid for this room
    pub fn compile(&self) -> Result<RoomBlueprint, BlueprintError> {
        let (errors, warnings) = self.validate();
        for warning in &warnings {
            warn!("blueprint '{}': {}", self.name, warning);
        }
        if !errors.is_empty() {
            return Err(BlueprintError::Invalid(errors));
        }

        let mut blueprint =
            RoomBlueprint::walled(&self.name, self.grid_width, self.grid_depth, self.cell_size);
        blueprint.room_center = WorldPos::default();
        blueprint.walkable_center = Some(GridPos::new(self.walkable_center.x, self.walkable_center.z));

        let mut seen_doors = HashSet::new();
        for door in self.doors.iter().chain(self.door_positions.iter()) {
            let pos = GridPos::new(door.x, door.z);
            if seen_doors.insert(pos) {
                if let Some(cell) = blueprint.cell_mut(pos) {
                    *cell = GridCell::door();
                }
                blueprint.doors.push(pos);
            }
        }

        for p in &self.placements {
            let origin = GridPos::new(p.x, p.z);
            let kind = p.interaction_type.as_deref();
            if p.is_interaction() {
                blueprint.place_prop(&p.prop_id, origin, (1, 1), CellType::Empty, true, kind);
            } else {
                let walkable = FLAT_PROPS.contains(&p.prop_id.as_str());
                blueprint.place_prop(&p.prop_id, origin, p.span_dims(), CellType::Furniture, walkable, kind);
            }
        }

        if let Some(points) = &self.interaction_points {
            let groups = [("work", &points.work), ("coffee", &points.coffee), ("sleep", &points.sleep)];
            for (kind, list) in groups {
                for point in list {
                    if let Some(cell) = blueprint.cell_mut(GridPos::new(point.x, point.z)) {
                        if cell.cell_type == CellType::Empty && cell.interaction_type.is_none() {
                            cell.interaction_type = Some(kind.to_string());
                        }
                    }
                }
            }
        }

        blueprint.rebuild_walkable_mask();
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_blueprint() -> BlueprintJson {
        BlueprintJson::from_json(
            r#"{
                "name": "Test BP",
                "gridWidth": 10,
                "gridDepth": 10,
                "walkableCenter": {"x": 5, "z": 5},
                "placements": [
                    {"propId": "desk-with-monitor", "x": 2, "z": 2, "span": {"w": 2, "d": 1}},
                    {"propId": "coffee-point", "x": 7, "z": 7, "type": "interaction", "interactionType": "coffee"},
                    {"propId": "rug", "x": 5, "z": 3}
                ],
                "doors": [{"x": 0, "z": 3}],
                "doorPositions": [{"x": 0, "z": 3}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_blueprint_has_no_errors() {
        let (errors, warnings) = valid_blueprint().validate();
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_grid_size_limits() {
        let mut bp = valid_blueprint();
        bp.grid_width = 1;
        bp.grid_depth = 999;
        let (errors, _) = bp.validate();
        assert!(errors.iter().any(|e| e.starts_with("gridWidth")));
        assert!(errors.iter().any(|e| e.starts_with("gridDepth")));
    }

    #[test]
    fn test_requires_a_door_on_the_edge() {
        let mut bp = valid_blueprint();
        bp.doors.clear();
        bp.door_positions.clear();
        let (errors, _) = bp.validate();
        assert!(errors.iter().any(|e| e.contains("at least one door")));

        bp.doors.push(BlueprintDoor { x: 4, z: 4, facing: None });
        let (errors, _) = bp.validate();
        assert!(errors.iter().any(|e| e.contains("must be on a wall edge")));
    }

    #[test]
    fn test_overlap_is_an_error_except_for_interactions() {
        let mut bp = valid_blueprint();
        bp.placements.push(BlueprintPlacement {
            prop_id: "plant".to_string(),
            x: 3,
            z: 2,
            placement_type: None,
            interaction_type: None,
            span: None,
        });
        let (errors, _) = bp.validate();
        assert!(errors.iter().any(|e| e.contains("overlaps with 'desk-with-monitor'")));

        bp.placements.pop();
        bp.placements.push(BlueprintPlacement {
            prop_id: "work-point".to_string(),
            x: 3,
            z: 2,
            placement_type: Some("interaction".to_string()),
            interaction_type: Some("work".to_string()),
            span: None,
        });
        let (errors, _) = bp.validate();
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_unknown_prop_and_door_mismatch_warn() {
        let mut bp = valid_blueprint();
        bp.placements[0].prop_id = "hover-tank".to_string();
        bp.door_positions.push(BlueprintDoor { x: 9, z: 4, facing: None });
        let (errors, warnings) = bp.validate();
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_bad_interaction_type() {
        let mut bp = valid_blueprint();
        bp.placements[1].interaction_type = Some("dance".to_string());
        let (errors, _) = bp.validate();
        assert!(errors.iter().any(|e| e.contains("unknown interactionType 'dance'")));
    }

    #[test]
    fn test_compile_builds_cells_and_mask() {
        let room = valid_blueprint().compile().unwrap();
        assert_eq!(room.grid_width, 10);
        assert_eq!(room.doors, vec![GridPos::new(0, 3)]);

        let door = room.cell(GridPos::new(0, 3)).unwrap();
        assert_eq!(door.cell_type, CellType::Door);
        assert!(!room.is_walkable(GridPos::new(0, 3)));

        let desk = room.cell(GridPos::new(2, 2)).unwrap();
        assert_eq!(desk.cell_type, CellType::Furniture);
        assert!(!room.is_walkable(GridPos::new(3, 2)));
        assert_eq!(room.cell(GridPos::new(3, 2)).unwrap().span_parent, Some(GridPos::new(2, 2)));

        let coffee = room.cell(GridPos::new(7, 7)).unwrap();
        assert_eq!(coffee.cell_type, CellType::Empty);
        assert_eq!(coffee.interaction_type.as_deref(), Some("coffee"));
        assert!(room.is_walkable(GridPos::new(7, 7)));

        assert_eq!(room.cell(GridPos::new(5, 3)).unwrap().cell_type, CellType::Furniture);
        assert!(room.is_walkable(GridPos::new(5, 3)));
    }

    #[test]
    fn test_compile_rejects_invalid() {
        let mut bp = valid_blueprint();
        bp.walkable_center = BlueprintPoint { x: 50, z: 5 };
        match bp.compile() {
            Err(BlueprintError::Invalid(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected invalid blueprint, got {:?}", other.map(|b| b.name)),
        }
    }
}
