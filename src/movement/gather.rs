use log::debug;

use crate::blueprint::{GridPos, RoomBlueprint, WorldPos};
use crate::spatial::{heading, zone_anchor, SpatialNavigator, Zone};
use crate::state::MeetingSeat;

use super::steering::DIRECTIONS;
use super::{BotMotion, Step, StepEnv};

/// Walk to an assigned meeting seat and sit.
///
/// The route is computed once, on the first frame the behavior runs, and
/// kept until the meeting ends (the behavior is then replaced, so the next
/// meeting computes a fresh route). A seat with no grid route leaves the
/// bot standing where it is; the route is retried after a random wait.
#[derive(Debug, Clone)]
pub struct Gather {
    seat: MeetingSeat,
    /// Bot belongs to another room and comes in through the entrance
    visitor: bool,
    waypoints: Vec<WorldPos>,
    index: usize,
    path_computed: bool,
    seated: bool,
    retry_timer: f64,
}

impl Gather {
    pub fn new(seat: MeetingSeat, visitor: bool) -> Self {
        Self {
            seat,
            visitor,
            waypoints: Vec::new(),
            index: 0,
            path_computed: false,
            seated: false,
            retry_timer: 0.0,
        }
    }

    pub fn seat(&self) -> &MeetingSeat {
        &self.seat
    }

    pub fn is_seated(&self) -> bool {
        self.seated
    }

    pub fn waypoints(&self) -> &[WorldPos] {
        &self.waypoints
    }

    fn sit(&mut self, motion: &mut BotMotion) {
        self.seated = true;
        motion.set_position(WorldPos::new(self.seat.x, self.seat.z));
        motion.facing = self.seat.angle;
        motion.target_facing = self.seat.angle;
    }

    pub fn update(&mut self, motion: &mut BotMotion, env: &mut StepEnv, dt: f64) -> Step {
        if self.seated {
            self.sit(motion);
            return Step::Still;
        }

        if self.retry_timer > 0.0 {
            self.retry_timer -= dt;
            return Step::Still;
        }

        if !self.path_computed {
            match meeting_route(env.blueprint, env.navigator, motion.position(), &self.seat, self.visitor) {
                Some(route) => {
                    debug!("Meeting route with {} waypoints", route.len());
                    self.waypoints = route;
                    self.index = 0;
                    self.path_computed = true;
                }
                None => {
                    self.retry_timer = env.wait_duration();
                    return Step::Still;
                }
            }
        }

        let position = motion.position();
        let last = self.waypoints.len().saturating_sub(1);
        loop {
            let Some(target) = self.waypoints.get(self.index).copied() else {
                self.sit(motion);
                return Step::Still;
            };
            let (dx, dz) = (target.x - position.x, target.z - position.z);
            let distance = (dx * dx + dz * dz).sqrt();
            let is_final = self.index >= last;
            let threshold = if is_final {
                env.config.meeting_final_threshold
            } else {
                env.config.meeting_waypoint_threshold
            };

            if distance / env.blueprint.cell_size < threshold {
                if is_final {
                    self.sit(motion);
                    return Step::Still;
                }
                self.index += 1;
                continue;
            }

            let t = (env.config.gather_speed * dt / distance).min(1.0);
            motion.set_position(position.lerp(&target, t));
            motion.target_facing = heading(dx, dz);
            return Step::Moved;
        }
    }
}

/// Walkable cell to stand on for a seat: the seat's own cell, else the
/// nearest open neighbour
fn approach_cell(blueprint: &RoomBlueprint, seat: WorldPos) -> Option<GridPos> {
    let cell = blueprint.world_to_grid(seat);
    if blueprint.is_walkable(cell) {
        return Some(cell);
    }
    let mut best: Option<(GridPos, f64)> = None;
    for (dx, dz) in DIRECTIONS {
        let next = cell.offset(dx, dz);
        if !blueprint.is_walkable(next) {
            continue;
        }
        let distance = blueprint.grid_to_world(next).distance_to(&seat);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((next, distance));
        }
    }
    best.map(|(cell, _)| cell)
}

/// World waypoints from `from` to a meeting seat, ending exactly on the seat.
///
/// Visitors are routed through the room entrance first. Deterministic: the
/// same inputs always produce the same waypoints. `None` when no walkable
/// cell next to the seat can be reached over the grid.
pub fn meeting_route(
    blueprint: &RoomBlueprint,
    navigator: &SpatialNavigator,
    from: WorldPos,
    seat: &MeetingSeat,
    visitor: bool,
) -> Option<Vec<WorldPos>> {
    let seat_pos = WorldPos::new(seat.x, seat.z);
    let mut cells: Vec<GridPos> = Vec::new();
    let mut cursor = blueprint.world_to_grid(from);

    if visitor {
        if let Some(entrance) = zone_anchor(blueprint, Zone::Entrance) {
            if let Some(path) = navigator.path_between(cursor, entrance, None) {
                cells.extend(path.waypoints);
                cursor = entrance;
            }
        }
    }

    let seat_path = approach_cell(blueprint, seat_pos)
        .and_then(|goal| navigator.path_between(cursor, goal, None));
    let Some(path) = seat_path else {
        debug!("No grid route to seat at ({:.2}, {:.2})", seat.x, seat.z);
        return None;
    };
    cells.extend(path.waypoints);

    let mut route: Vec<WorldPos> = Vec::with_capacity(cells.len() + 1);
    for cell in cells {
        let point = blueprint.grid_to_world(cell);
        if route.last() != Some(&point) {
            route.push(point);
        }
    }
    if route.last() != Some(&seat_pos) {
        route.push(seat_pos);
    }
    Some(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::blueprint::GridCell;
    use crate::movement::MovementConfig;
    use crate::spatial::NavigatorConfig;

    fn room() -> Arc<RoomBlueprint> {
        let mut bp = RoomBlueprint::walled("Meeting", 10, 10, 0.6);
        bp.rebuild_walkable_mask();
        Arc::new(bp)
    }

    /// Gather with a route already laid out, as if computed on an earlier frame
    fn routed(seat: WorldPos, waypoints: Vec<WorldPos>) -> Gather {
        let mut gather = Gather::new(
            MeetingSeat {
                x: seat.x,
                z: seat.z,
                angle: 0.0,
            },
            false,
        );
        gather.waypoints = waypoints;
        gather.path_computed = true;
        gather
    }

    #[test]
    fn test_intermediate_waypoint_is_passed_within_half_a_cell() {
        let bp = room();
        let navigator = SpatialNavigator::new(Arc::clone(&bp), NavigatorConfig::default());
        let config = MovementConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut env = StepEnv {
            blueprint: &bp,
            navigator: &navigator,
            config: &config,
            rng: &mut rng,
        };

        let corner = bp.grid_to_world(GridPos::new(3, 3));
        let seat = bp.grid_to_world(GridPos::new(3, 7));
        let mut gather = routed(seat, vec![corner, seat]);
        // 0.4 cells short of the corner, on the side away from the seat
        let mut motion = BotMotion::at(WorldPos::new(corner.x, corner.z - 0.4 * bp.cell_size), 0.0);

        assert_eq!(gather.update(&mut motion, &mut env, 0.001), Step::Moved);
        assert_eq!(gather.index, 1);
        assert!(!gather.is_seated());
    }

    #[test]
    fn test_final_waypoint_needs_the_tighter_threshold() {
        let bp = room();
        let navigator = SpatialNavigator::new(Arc::clone(&bp), NavigatorConfig::default());
        let config = MovementConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut env = StepEnv {
            blueprint: &bp,
            navigator: &navigator,
            config: &config,
            rng: &mut rng,
        };

        let seat = bp.grid_to_world(GridPos::new(5, 5));
        let mut gather = routed(seat, vec![seat]);
        let mut motion = BotMotion::at(WorldPos::new(seat.x - 0.4 * bp.cell_size, seat.z), 0.0);

        // 0.4 cells out is inside the waypoint radius but not the seat radius
        assert_eq!(gather.update(&mut motion, &mut env, 0.001), Step::Moved);
        assert!(!gather.is_seated());

        let mut motion = BotMotion::at(WorldPos::new(seat.x - 0.2 * bp.cell_size, seat.z), 0.0);
        assert_eq!(gather.update(&mut motion, &mut env, 0.001), Step::Still);
        assert!(gather.is_seated());
        assert_eq!(motion.position(), seat);
    }

    #[test]
    fn test_unreachable_seat_has_no_route() {
        let mut bp = RoomBlueprint::walled("Split", 12, 12, 0.6);
        for z in 1..11 {
            if let Some(cell) = bp.cell_mut(GridPos::new(6, z)) {
                *cell = GridCell::wall();
            }
        }
        bp.rebuild_walkable_mask();
        let bp = Arc::new(bp);
        let navigator = SpatialNavigator::new(Arc::clone(&bp), NavigatorConfig::default());
        let seat_pos = bp.grid_to_world(GridPos::new(9, 5));
        let seat = MeetingSeat {
            x: seat_pos.x,
            z: seat_pos.z,
            angle: 0.0,
        };
        let from = bp.grid_to_world(GridPos::new(2, 5));

        assert!(meeting_route(&bp, &navigator, from, &seat, false).is_none());
        assert!(meeting_route(&bp, &navigator, from, &seat, true).is_none());

        // Same side of the wall is fine
        let near = bp.grid_to_world(GridPos::new(10, 8));
        assert!(meeting_route(&bp, &navigator, near, &seat, false).is_some());
    }

    #[test]
    fn test_unreachable_seat_holds_position_and_waits() {
        let mut bp = RoomBlueprint::walled("Split", 12, 12, 0.6);
        for z in 1..11 {
            if let Some(cell) = bp.cell_mut(GridPos::new(6, z)) {
                *cell = GridCell::wall();
            }
        }
        bp.rebuild_walkable_mask();
        let bp = Arc::new(bp);
        let navigator = SpatialNavigator::new(Arc::clone(&bp), NavigatorConfig::default());
        let config = MovementConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut env = StepEnv {
            blueprint: &bp,
            navigator: &navigator,
            config: &config,
            rng: &mut rng,
        };

        let seat_pos = bp.grid_to_world(GridPos::new(9, 5));
        let mut gather = Gather::new(
            MeetingSeat {
                x: seat_pos.x,
                z: seat_pos.z,
                angle: 0.0,
            },
            false,
        );
        let start = bp.grid_to_world(GridPos::new(2, 5));
        let mut motion = BotMotion::at(start, 0.0);

        assert_eq!(gather.update(&mut motion, &mut env, 1.0 / 30.0), Step::Still);
        assert!(gather.retry_timer >= config.min_wait);
        assert!(gather.waypoints().is_empty());
        for _ in 0..300 {
            assert_eq!(gather.update(&mut motion, &mut env, 1.0 / 30.0), Step::Still);
        }
        assert_eq!(motion.position(), start);
        assert!(!gather.is_seated());
    }
}
