mod layout;

pub use layout::{
    BlueprintDoor, BlueprintJson, BlueprintPlacement, BlueprintPoint, InteractionPoints, PlacementSpan,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or compiling a room blueprint
#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("failed to read blueprint: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed blueprint json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid blueprint: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Classification of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Wall,
    Empty,
    Furniture,
    Door,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Wall => "wall",
            CellType::Empty => "empty",
            CellType::Furniture => "furniture",
            CellType::Door => "door",
        }
    }
}

/// A discrete grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub z: i32,
}

impl GridPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn offset(&self, dx: i32, dz: i32) -> GridPos {
        GridPos::new(self.x + dx, self.z + dz)
    }

    /// Euclidean distance in cells
    pub fn distance_to(&self, other: &GridPos) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dz = (other.z - self.z) as f64;
        (dx * dx + dz * dz).sqrt()
    }

    /// Chebyshev (king-move) distance in cells
    pub fn chebyshev_to(&self, other: &GridPos) -> i32 {
        (other.x - self.x).abs().max((other.z - self.z).abs())
    }
}

/// A continuous position on the room floor (XZ plane)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f64,
    pub z: f64,
}

impl WorldPos {
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn distance_to(&self, other: &WorldPos) -> f64 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Linear interpolation toward another position
    pub fn lerp(&self, target: &WorldPos, t: f64) -> WorldPos {
        let t = t.clamp(0.0, 1.0);
        WorldPos {
            x: self.x + (target.x - self.x) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }
}

/// One cell of a room blueprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    #[serde(rename = "type")]
    pub cell_type: CellType,
    pub walkable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prop_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    /// Origin cell of a multi-cell prop; set only on secondary cells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_parent: Option<GridPos>,
}

impl GridCell {
    pub fn empty() -> Self {
        Self {
            cell_type: CellType::Empty,
            walkable: true,
            prop_id: None,
            interaction_type: None,
            span_parent: None,
        }
    }

    pub fn wall() -> Self {
        Self {
            cell_type: CellType::Wall,
            walkable: false,
            ..Self::empty()
        }
    }

    pub fn door() -> Self {
        Self {
            cell_type: CellType::Door,
            ..Self::empty()
        }
    }

    /// True for the cell that owns a prop (not a span secondary)
    pub fn is_prop_origin(&self) -> bool {
        self.prop_id.is_some() && self.span_parent.is_none()
    }
}

/// Static grid description of one room.
///
/// Cells are stored row-major as `cells[z][x]`. The blueprint never changes
/// while a room is focused, so every consumer shares it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBlueprint {
    pub name: String,
    pub cell_size: f64,
    pub grid_width: i32,
    pub grid_depth: i32,
    pub cells: Vec<Vec<GridCell>>,
    /// Cells a bot may occupy; `None` for rooms without grid walking
    #[serde(default)]
    pub bot_walkable_mask: Option<Vec<Vec<bool>>>,
    /// World-space center of the room
    #[serde(default)]
    pub room_center: WorldPos,
    #[serde(default)]
    pub walkable_center: Option<GridPos>,
    #[serde(default)]
    pub doors: Vec<GridPos>,
}

impl RoomBlueprint {
    /// An open room of `width` x `depth` cells enclosed by walls
    pub fn walled(name: &str, width: i32, depth: i32, cell_size: f64) -> Self {
        let cells = (0..depth)
            .map(|z| {
                (0..width)
                    .map(|x| {
                        if x == 0 || z == 0 || x == width - 1 || z == depth - 1 {
                            GridCell::wall()
                        } else {
                            GridCell::empty()
                        }
                    })
                    .collect()
            })
            .collect();

        let mut blueprint = Self {
            name: name.to_string(),
            cell_size,
            grid_width: width,
            grid_depth: depth,
            cells,
            bot_walkable_mask: None,
            room_center: WorldPos::default(),
            walkable_center: Some(GridPos::new(width / 2, depth / 2)),
            doors: Vec::new(),
        };
        blueprint.rebuild_walkable_mask();
        blueprint
    }

    /// Derive the bot mask from cell walkability; doors are never occupied
    pub fn rebuild_walkable_mask(&mut self) {
        let mask = self
            .cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.walkable && cell.cell_type != CellType::Door)
                    .collect()
            })
            .collect();
        self.bot_walkable_mask = Some(mask);
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.z >= 0 && pos.x < self.grid_width && pos.z < self.grid_depth
    }

    pub fn cell(&self, pos: GridPos) -> Option<&GridCell> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells
            .get(pos.z as usize)
            .and_then(|row| row.get(pos.x as usize))
    }

    pub fn cell_mut(&mut self, pos: GridPos) -> Option<&mut GridCell> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells
            .get_mut(pos.z as usize)
            .and_then(|row| row.get_mut(pos.x as usize))
    }

    pub fn has_walkable_mask(&self) -> bool {
        self.bot_walkable_mask.is_some()
    }

    /// Whether a bot may stand on this cell.
    ///
    /// Uses the bot mask when present, falling back to per-cell walkability.
    pub fn is_walkable(&self, pos: GridPos) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        match &self.bot_walkable_mask {
            Some(mask) => mask
                .get(pos.z as usize)
                .and_then(|row| row.get(pos.x as usize))
                .copied()
                .unwrap_or(false),
            None => self.cell(pos).map(|c| c.walkable).unwrap_or(false),
        }
    }

    /// Whether a continuous world position lies on a walkable cell
    pub fn is_walkable_at(&self, pos: WorldPos) -> bool {
        self.is_walkable(self.world_to_grid(pos))
    }

    fn center_offset(&self) -> (f64, f64) {
        let half_w = (self.grid_width - 1) as f64 * self.cell_size / 2.0;
        let half_d = (self.grid_depth - 1) as f64 * self.cell_size / 2.0;
        (half_w - self.room_center.x, half_d - self.room_center.z)
    }

    /// World position of a cell's center
    pub fn grid_to_world(&self, pos: GridPos) -> WorldPos {
        let (ox, oz) = self.center_offset();
        WorldPos::new(
            pos.x as f64 * self.cell_size - ox,
            pos.z as f64 * self.cell_size - oz,
        )
    }

    /// The cell whose center is nearest to a world position
    pub fn world_to_grid(&self, pos: WorldPos) -> GridPos {
        let (gx, gz) = self.world_to_grid_f(pos);
        GridPos::new((gx + 0.5).floor() as i32, (gz + 0.5).floor() as i32)
    }

    /// Continuous grid coordinates of a world position
    pub fn world_to_grid_f(&self, pos: WorldPos) -> (f64, f64) {
        let (ox, oz) = self.center_offset();
        ((pos.x + ox) / self.cell_size, (pos.z + oz) / self.cell_size)
    }

    /// World-space center of the grid
    pub fn world_center(&self) -> WorldPos {
        self.room_center
    }

    /// Largest distance from the center to an edge, per axis
    pub fn half_extents(&self) -> (f64, f64) {
        (
            (self.grid_width - 1) as f64 * self.cell_size / 2.0,
            (self.grid_depth - 1) as f64 * self.cell_size / 2.0,
        )
    }

    /// Iterate over every cell with its grid position
    pub fn iter_cells(&self) -> impl Iterator<Item = (GridPos, &GridCell)> {
        self.cells.iter().enumerate().flat_map(|(z, row)| {
            row.iter()
                .enumerate()
                .map(move |(x, cell)| (GridPos::new(x as i32, z as i32), cell))
        })
    }

    /// Origin cell of the prop with the given id
    pub fn find_prop(&self, prop_id: &str) -> Option<GridPos> {
        self.iter_cells()
            .find(|(_, cell)| cell.is_prop_origin() && cell.prop_id.as_deref() == Some(prop_id))
            .map(|(pos, _)| pos)
    }

    /// Every cell covered by a prop, origin and span secondaries alike
    pub fn prop_cells(&self, prop_id: &str) -> Vec<GridPos> {
        self.iter_cells()
            .filter(|(_, cell)| cell.prop_id.as_deref() == Some(prop_id))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Mark a rectangular footprint as a prop
    pub fn place_prop(
        &mut self,
        prop_id: &str,
        origin: GridPos,
        span: (i32, i32),
        cell_type: CellType,
        walkable: bool,
        interaction_type: Option<&str>,
    ) {
        for dz in 0..span.1.max(1) {
            for dx in 0..span.0.max(1) {
                let pos = origin.offset(dx, dz);
                if let Some(cell) = self.cell_mut(pos) {
                    cell.cell_type = cell_type;
                    cell.walkable = walkable;
                    cell.prop_id = Some(prop_id.to_string());
                    cell.interaction_type = interaction_type.map(String::from);
                    cell.span_parent = if dx == 0 && dz == 0 { None } else { Some(origin) };
                }
            }
        }
    }
}
