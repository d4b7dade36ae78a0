// Waypoint navigation across a single room's grid.
//
// Paths come from a breadth-first search over the 8-connected bot grid:
// diagonals are only taken when both orthogonal neighbours are open, so a
// path never clips a wall corner. The search order is fixed, so identical
// inputs always yield identical waypoints.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::blueprint::{CellType, GridPos, RoomBlueprint};

use super::zones::{grid_to_zone, zone_anchor, Zone};

/// Neighbour order for the search: cardinals first, then diagonals
const STEPS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Navigator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Suggested walking speed for computed paths (world units per second)
    pub default_speed: f64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self { default_speed: 1.6 }
    }
}

/// An ordered list of waypoints plus the speed to walk them at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationPath {
    pub waypoints: Vec<GridPos>,
    pub speed: f64,
}

impl NavigationPath {
    pub fn destination(&self) -> Option<GridPos> {
        self.waypoints.last().copied()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Machine-readable placement of one prop
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropPlacement {
    pub prop_id: String,
    pub x: i32,
    pub z: i32,
    pub width: i32,
    pub depth: i32,
    pub cell_type: CellType,
    pub walkable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    pub zone: Zone,
}

/// Converts symbolic targets (props, zones) into waypoint paths
#[derive(Debug)]
pub struct SpatialNavigator {
    blueprint: Arc<RoomBlueprint>,
    config: NavigatorConfig,
}

impl SpatialNavigator {
    pub fn new(blueprint: Arc<RoomBlueprint>, config: NavigatorConfig) -> Self {
        Self { blueprint, config }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Path to a walkable cell next to (or on, if walkable) the given prop
    pub fn navigate_to_prop(
        &self,
        from: GridPos,
        prop_id: &str,
        speed: Option<f64>,
    ) -> Option<NavigationPath> {
        let Some(origin) = self.blueprint.find_prop(prop_id) else {
            debug!("navigate: unknown prop '{}'", prop_id);
            return None;
        };
        let footprint = self.footprint(origin);

        let mut goals = HashSet::new();
        for cell in &footprint {
            if self.blueprint.is_walkable(*cell) {
                goals.insert(*cell);
                continue;
            }
            for (dx, dz) in &STEPS[..4] {
                let next = cell.offset(*dx, *dz);
                if self.blueprint.is_walkable(next) && !footprint.contains(&next) {
                    goals.insert(next);
                }
            }
        }

        let path = self.search(from, |p| goals.contains(&p), speed);
        if path.is_none() {
            debug!("navigate: prop '{}' unreachable from {:?}", prop_id, from);
        }
        path
    }

    /// Path to the representative cell of a named zone
    pub fn navigate_to_zone(
        &self,
        from: GridPos,
        zone_name: &str,
        speed: Option<f64>,
    ) -> Option<NavigationPath> {
        let zone: Zone = match zone_name.parse() {
            Ok(zone) => zone,
            Err(e) => {
                debug!("navigate: {}", e);
                return None;
            }
        };
        let anchor = zone_anchor(&self.blueprint, zone)?;
        self.path_between(from, anchor, speed)
    }

    /// Path between two cells; `None` if `to` is blocked or unreachable
    pub fn path_between(
        &self,
        from: GridPos,
        to: GridPos,
        speed: Option<f64>,
    ) -> Option<NavigationPath> {
        if !self.blueprint.is_walkable(to) {
            return None;
        }
        self.search(from, |p| p == to, speed)
    }

    /// Cells covered by the prop whose origin is `origin`
    fn footprint(&self, origin: GridPos) -> Vec<GridPos> {
        self.blueprint
            .iter_cells()
            .filter(|(pos, cell)| *pos == origin || cell.span_parent == Some(origin))
            .map(|(pos, _)| pos)
            .collect()
    }

    fn can_step(&self, from: GridPos, dx: i32, dz: i32) -> bool {
        let next = from.offset(dx, dz);
        if !self.blueprint.is_walkable(next) {
            return false;
        }
        if dx != 0 && dz != 0 {
            return self.blueprint.is_walkable(from.offset(dx, 0))
                && self.blueprint.is_walkable(from.offset(0, dz));
        }
        true
    }

    fn search(
        &self,
        from: GridPos,
        is_goal: impl Fn(GridPos) -> bool,
        speed: Option<f64>,
    ) -> Option<NavigationPath> {
        if !self.blueprint.in_bounds(from) {
            return None;
        }
        let speed = speed.unwrap_or(self.config.default_speed);

        if is_goal(from) {
            return Some(NavigationPath {
                waypoints: vec![from],
                speed,
            });
        }

        let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
        let mut queue = VecDeque::new();
        came_from.insert(from, from);
        queue.push_back(from);

        while let Some(pos) = queue.pop_front() {
            for (dx, dz) in STEPS {
                if !self.can_step(pos, dx, dz) {
                    continue;
                }
                let next = pos.offset(dx, dz);
                if came_from.contains_key(&next) {
                    continue;
                }
                came_from.insert(next, pos);
                if is_goal(next) {
                    let cells = reconstruct(&came_from, from, next);
                    return Some(NavigationPath {
                        waypoints: compress(from, &cells),
                        speed,
                    });
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Compact text description of the room for non-spatial callers
    pub fn get_layout_summary(&self, room_name: &str) -> String {
        let bp = &self.blueprint;
        let mut out = format!(
            "{} ({}x{} cells, {:.1}m each).",
            room_name, bp.grid_width, bp.grid_depth, bp.cell_size
        );

        if !bp.doors.is_empty() {
            let doors: Vec<String> = bp.doors.iter().map(|d| format!("({},{})", d.x, d.z)).collect();
            let _ = write!(out, " Doors: {}.", doors.join(" "));
        }

        let layout = self.get_prop_layout();
        for zone in Zone::ALL {
            let props: Vec<String> = layout
                .iter()
                .filter(|p| p.zone == zone)
                .map(|p| match &p.interaction_type {
                    Some(kind) => format!("{}[{}]", p.prop_id, kind),
                    None => p.prop_id.clone(),
                })
                .collect();
            if !props.is_empty() {
                let _ = write!(out, " {}: {}.", zone, props.join(", "));
            }
        }

        out
    }

    /// Every prop with its footprint and zone, ordered by position
    pub fn get_prop_layout(&self) -> Vec<PropPlacement> {
        let bp = &self.blueprint;
        let mut layout: Vec<PropPlacement> = bp
            .iter_cells()
            .filter(|(_, cell)| cell.is_prop_origin())
            .filter_map(|(origin, cell)| {
                let prop_id = cell.prop_id.clone()?;
                let footprint = self.footprint(origin);
                let width = footprint.iter().map(|p| p.x - origin.x + 1).max().unwrap_or(1);
                let depth = footprint.iter().map(|p| p.z - origin.z + 1).max().unwrap_or(1);
                Some(PropPlacement {
                    prop_id,
                    x: origin.x,
                    z: origin.z,
                    width,
                    depth,
                    cell_type: cell.cell_type,
                    walkable: bp.is_walkable(origin),
                    interaction_type: cell.interaction_type.clone(),
                    zone: grid_to_zone(origin, bp.grid_width, bp.grid_depth, &bp.doors),
                })
            })
            .collect();
        layout.sort_by_key(|p| (p.z, p.x));
        layout
    }
}

fn reconstruct(came_from: &HashMap<GridPos, GridPos>, from: GridPos, goal: GridPos) -> Vec<GridPos> {
    let mut cells = vec![goal];
    let mut current = goal;
    while current != from {
        match came_from.get(&current) {
            Some(prev) => {
                current = *prev;
                cells.push(current);
            }
            None => break,
        }
    }
    cells.reverse();
    cells
}

/// Keep only turning points and the final cell; drops the start cell
fn compress(from: GridPos, cells: &[GridPos]) -> Vec<GridPos> {
    let mut waypoints = Vec::new();
    let mut previous = from;
    let mut heading: Option<(i32, i32)> = None;

    for (i, cell) in cells.iter().enumerate().skip(1) {
        let step = (cell.x - previous.x, cell.z - previous.z);
        if let Some(h) = heading {
            if h != step {
                waypoints.push(cells[i - 1]);
            }
        }
        heading = Some(step);
        previous = *cell;
    }

    if let Some(last) = cells.last() {
        if *last != from {
            waypoints.push(*last);
        }
    }
    waypoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> RoomBlueprint {
        let mut bp = RoomBlueprint::walled("Office", 12, 10, 1.0);
        bp.doors.push(GridPos::new(0, 5));
        bp.place_prop("desk", GridPos::new(3, 2), (2, 1), CellType::Furniture, false, Some("work"));
        bp.place_prop("coffee-machine", GridPos::new(10, 8), (1, 1), CellType::Furniture, false, Some("coffee"));
        bp.place_prop("rug", GridPos::new(6, 5), (2, 2), CellType::Furniture, true, None);
        // Partition wall with a gap at z = 8
        for z in 1..8 {
            bp.cell_mut(GridPos::new(8, z)).unwrap().cell_type = CellType::Wall;
            bp.cell_mut(GridPos::new(8, z)).unwrap().walkable = false;
        }
        bp.rebuild_walkable_mask();
        bp
    }

    fn navigator(bp: RoomBlueprint) -> SpatialNavigator {
        SpatialNavigator::new(Arc::new(bp), NavigatorConfig::default())
    }

    fn walk_cells(from: GridPos, path: &NavigationPath) -> Vec<GridPos> {
        // Expand waypoints back into unit steps
        let mut cells = vec![from];
        let mut current = from;
        for wp in &path.waypoints {
            while current != *wp {
                current = current.offset((wp.x - current.x).signum(), (wp.z - current.z).signum());
                cells.push(current);
            }
        }
        cells
    }

    #[test]
    fn test_path_to_prop_ends_adjacent() {
        let bp = office();
        let nav = navigator(bp.clone());
        let from = GridPos::new(2, 7);
        let path = nav.navigate_to_prop(from, "desk", None).unwrap();
        let end = path.destination().unwrap();

        assert!(bp.is_walkable(end));
        let adjacent = [GridPos::new(3, 2), GridPos::new(4, 2)]
            .iter()
            .any(|c| (c.x - end.x).abs() + (c.z - end.z).abs() == 1);
        assert!(adjacent, "{:?} not next to the desk", end);
        assert_eq!(path.speed, NavigatorConfig::default().default_speed);
    }

    #[test]
    fn test_path_never_crosses_blocked_cells() {
        let bp = office();
        let nav = navigator(bp.clone());
        let from = GridPos::new(3, 4);
        let path = nav.navigate_to_prop(from, "coffee-machine", Some(2.5)).unwrap();

        assert_eq!(path.speed, 2.5);
        for cell in walk_cells(from, &path) {
            assert!(bp.is_walkable(cell), "path crosses {:?}", cell);
        }
        // The only way through the partition is the gap at z = 8
        assert!(walk_cells(from, &path).contains(&GridPos::new(8, 8)));
    }

    #[test]
    fn test_walkable_prop_is_its_own_goal() {
        let bp = office();
        let nav = navigator(bp.clone());
        let path = nav.navigate_to_prop(GridPos::new(3, 6), "rug", None).unwrap();
        let end = path.destination().unwrap();
        assert!(bp.prop_cells("rug").contains(&end));
    }

    #[test]
    fn test_unknown_and_unreachable_targets() {
        let mut bp = office();
        assert!(navigator(bp.clone()).navigate_to_prop(GridPos::new(2, 2), "jukebox", None).is_none());

        // Seal the gap: the coffee machine becomes unreachable from the west
        bp.cell_mut(GridPos::new(8, 8)).unwrap().walkable = false;
        bp.rebuild_walkable_mask();
        let nav = navigator(bp);
        assert!(nav.navigate_to_prop(GridPos::new(2, 2), "coffee-machine", None).is_none());
    }

    #[test]
    fn test_paths_are_deterministic() {
        let nav = navigator(office());
        let a = nav.navigate_to_prop(GridPos::new(1, 1), "coffee-machine", None);
        let b = nav.navigate_to_prop(GridPos::new(1, 1), "coffee-machine", None);
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_navigate_to_zone() {
        let bp = office();
        let nav = navigator(bp.clone());
        let path = nav.navigate_to_zone(GridPos::new(4, 5), "entrance", None).unwrap();
        let end = path.destination().unwrap();
        assert!(end.chebyshev_to(&GridPos::new(0, 5)) <= 2);
        assert!(nav.navigate_to_zone(GridPos::new(4, 5), "rooftop", None).is_none());
    }

    #[test]
    fn test_start_on_goal_yields_single_waypoint() {
        let nav = navigator(office());
        let path = nav.path_between(GridPos::new(2, 2), GridPos::new(2, 2), None).unwrap();
        assert_eq!(path.waypoints, vec![GridPos::new(2, 2)]);
    }

    #[test]
    fn test_compress_keeps_turning_points() {
        let cells = [
            GridPos::new(1, 1),
            GridPos::new(2, 1),
            GridPos::new(3, 1),
            GridPos::new(3, 2),
            GridPos::new(3, 3),
        ];
        assert_eq!(
            compress(GridPos::new(1, 1), &cells),
            vec![GridPos::new(3, 1), GridPos::new(3, 3)]
        );
    }

    #[test]
    fn test_layout_summary_and_prop_layout() {
        let nav = navigator(office());
        let layout = nav.get_prop_layout();
        assert_eq!(layout.len(), 3);
        let desk = layout.iter().find(|p| p.prop_id == "desk").unwrap();
        assert_eq!((desk.width, desk.depth), (2, 1));
        assert_eq!(desk.interaction_type.as_deref(), Some("work"));

        let summary = nav.get_layout_summary("Office");
        assert!(summary.starts_with("Office (12x10 cells"));
        assert!(summary.contains("desk[work]"));
        assert!(summary.contains("coffee-machine[coffee]"));
        assert!(summary.contains("Doors: (0,5)"));
    }
}
