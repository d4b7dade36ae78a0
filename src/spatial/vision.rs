use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blueprint::{CellType, GridPos, RoomBlueprint};

use super::normalize_angle;

/// Tolerance for range and FOV boundary comparisons
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Vision tuning for one room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Maximum sight distance in cells
    pub range: f64,
    /// Field of view in degrees (0-360)
    pub fov_degrees: f64,
    /// Rays cast across the FOV arc by `get_visible_cells`
    pub ray_count: u32,
    /// Whether furniture cells block line of sight
    pub furniture_blocks: bool,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            range: 8.0,
            fov_degrees: 120.0,
            ray_count: 24,
            furniture_blocks: false,
        }
    }
}

/// Why a line-of-sight query failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReason {
    OutOfRange,
    OutsideFov,
    Wall,
    Furniture,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::OutOfRange => "out-of-range",
            BlockReason::OutsideFov => "outside-fov",
            BlockReason::Wall => "wall",
            BlockReason::Furniture => "furniture",
        }
    }
}

/// Result of a single `can_see` query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub visible: bool,
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<BlockReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<GridPos>,
}

impl Visibility {
    fn clear(distance: f64) -> Self {
        Self {
            visible: true,
            distance,
            blocked_by: None,
            blocked_at: None,
        }
    }

    fn blocked(distance: f64, reason: BlockReason, at: Option<GridPos>) -> Self {
        Self {
            visible: false,
            distance,
            blocked_by: Some(reason),
            blocked_at: at,
        }
    }
}

/// A prop seen by an observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleProp {
    pub prop_id: String,
    pub distance: f64,
}

/// Line-of-sight and field-of-view queries over a room's cells.
///
/// Bearings follow `atan2(dx, dz)`: angle 0 looks down +z.
#[derive(Debug)]
pub struct VisionSystem {
    blueprint: Arc<RoomBlueprint>,
    config: VisionConfig,
}

impl VisionSystem {
    pub fn new(blueprint: Arc<RoomBlueprint>, config: VisionConfig) -> Self {
        Self { blueprint, config }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    fn half_fov(&self) -> f64 {
        self.config.fov_degrees.clamp(0.0, 360.0).to_radians() / 2.0
    }

    fn has_full_fov(&self) -> bool {
        self.config.fov_degrees >= 360.0
    }

    /// Which obstacle (if any) this cell represents for sight lines
    fn blocker(&self, pos: GridPos) -> Option<BlockReason> {
        match self.blueprint.cell(pos)?.cell_type {
            CellType::Wall => Some(BlockReason::Wall),
            CellType::Furniture if self.config.furniture_blocks => Some(BlockReason::Furniture),
            _ => None,
        }
    }

    /// Can an observer at `from`, facing `facing`, see the cell `to`?
    pub fn can_see(&self, from: GridPos, to: GridPos, facing: f64) -> Visibility {
        let dx = (to.x - from.x) as f64;
        let dz = (to.z - from.z) as f64;
        let distance = (dx * dx + dz * dz).sqrt();

        if distance == 0.0 {
            return Visibility::clear(0.0);
        }

        if distance > self.config.range + BOUNDARY_EPSILON {
            return Visibility::blocked(distance, BlockReason::OutOfRange, None);
        }

        if !self.has_full_fov() {
            let bearing = dx.atan2(dz);
            let offset = normalize_angle(bearing - facing);
            if offset.abs() > self.half_fov() + BOUNDARY_EPSILON {
                return Visibility::blocked(distance, BlockReason::OutsideFov, None);
            }
        }

        // Walk the intermediate cells; the observer and target cells never block
        let steps = (to.x - from.x).abs().max((to.z - from.z).abs());
        for i in 1..steps {
            let t = i as f64 / steps as f64;
            let cell = GridPos::new(
                (from.x as f64 + dx * t).round() as i32,
                (from.z as f64 + dz * t).round() as i32,
            );
            if let Some(reason) = self.blocker(cell) {
                return Visibility::blocked(distance, reason, Some(cell));
            }
        }

        Visibility::clear(distance)
    }

    /// Every cell reached by the FOV rays, in the order first traversed.
    ///
    /// Blocking cells are included (they are seen), rays stop there.
    pub fn get_visible_cells(&self, from: GridPos, facing: f64) -> Vec<GridPos> {
        let mut seen = HashSet::new();
        let mut cells = Vec::new();

        if self.blueprint.in_bounds(from) {
            seen.insert(from);
            cells.push(from);
        }

        for angle in self.ray_angles(facing) {
            let (sin, cos) = angle.sin_cos();
            let max_steps = self.config.range.floor() as i32;
            for step in 1..=max_steps {
                let t = step as f64;
                let cell = GridPos::new(
                    (from.x as f64 + sin * t).round() as i32,
                    (from.z as f64 + cos * t).round() as i32,
                );
                if !self.blueprint.in_bounds(cell) {
                    break;
                }
                if seen.insert(cell) {
                    cells.push(cell);
                }
                if self.blocker(cell).is_some() {
                    break;
                }
            }
        }

        cells
    }

    fn ray_angles(&self, facing: f64) -> Vec<f64> {
        let count = self.config.ray_count.max(1);
        if self.has_full_fov() {
            return (0..count)
                .map(|i| facing + 2.0 * PI * i as f64 / count as f64)
                .collect();
        }

        let half = self.half_fov();
        if count == 1 {
            return vec![facing];
        }
        let step = 2.0 * half / (count - 1) as f64;
        (0..count).map(|i| facing - half + step * i as f64).collect()
    }

    /// Props whose origin cell is visible, nearest first
    pub fn get_visible_props(&self, from: GridPos, facing: f64) -> Vec<VisibleProp> {
        let mut nearest: HashMap<String, f64> = HashMap::new();

        for pos in self.get_visible_cells(from, facing) {
            let Some(cell) = self.blueprint.cell(pos) else {
                continue;
            };
            if !cell.is_prop_origin() {
                continue;
            }
            if let Some(prop_id) = &cell.prop_id {
                let distance = from.distance_to(&pos);
                nearest
                    .entry(prop_id.clone())
                    .and_modify(|d| *d = d.min(distance))
                    .or_insert(distance);
            }
        }

        let mut props: Vec<VisibleProp> = nearest
            .into_iter()
            .map(|(prop_id, distance)| VisibleProp { prop_id, distance })
            .collect();
        props.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.prop_id.cmp(&b.prop_id))
        });
        props
    }
}
