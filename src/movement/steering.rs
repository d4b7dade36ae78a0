use rand::rngs::StdRng;
use rand::Rng;

use crate::blueprint::{GridPos, RoomBlueprint, WorldPos};
use crate::spatial::normalize_angle;

use super::MovementConfig;

/// The eight grid directions, cardinals first
pub const DIRECTIONS: [(i32, i32); 8] = [
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Lowest weight a walkable direction can get in the weighted draw
const MIN_DIRECTION_WEIGHT: f64 = 0.05;

/// Unit vector of a grid direction
pub fn unit(dir: (i32, i32)) -> (f64, f64) {
    let (dx, dz) = (dir.0 as f64, dir.1 as f64);
    let len = (dx * dx + dz * dz).sqrt();
    if len == 0.0 {
        (0.0, 0.0)
    } else {
        (dx / len, dz / len)
    }
}

/// Whether a bot can move one cell from `from` in `dir`.
///
/// Diagonal steps need both orthogonal neighbours open so a bot never
/// clips a wall corner.
pub fn can_step(blueprint: &RoomBlueprint, from: GridPos, dir: (i32, i32)) -> bool {
    if !blueprint.is_walkable(from.offset(dir.0, dir.1)) {
        return false;
    }
    if dir.0 != 0 && dir.1 != 0 {
        return blueprint.is_walkable(from.offset(dir.0, 0))
            && blueprint.is_walkable(from.offset(0, dir.1));
    }
    true
}

/// Consecutive steps available in `dir`, up to `lookahead`
pub fn open_cells(blueprint: &RoomBlueprint, from: GridPos, dir: (i32, i32), lookahead: u32) -> u32 {
    let mut open = 0;
    let mut pos = from;
    while open < lookahead && can_step(blueprint, pos, dir) {
        pos = pos.offset(dir.0, dir.1);
        open += 1;
    }
    open
}

/// Cell the wander pull is centred on
fn gravity_center(blueprint: &RoomBlueprint) -> (f64, f64) {
    match blueprint.walkable_center {
        Some(center) => (center.x as f64, center.z as f64),
        None => (
            (blueprint.grid_width - 1) as f64 / 2.0,
            (blueprint.grid_depth - 1) as f64 / 2.0,
        ),
    }
}

/// Weighted random choice of a walkable direction.
///
/// Each open direction scores `1 + open cells ahead + center gravity +
/// jitter`. Center gravity is the alignment with the vector toward the
/// room center, scaled by how far out the bot is (nothing at the center,
/// full weight at the walls). The direction is drawn proportionally to
/// score, so long corridors and inward moves are favoured without the
/// choice becoming predictable. Returns `None` when boxed in.
pub fn pick_walkable_dir(
    blueprint: &RoomBlueprint,
    from: GridPos,
    config: &MovementConfig,
    rng: &mut StdRng,
) -> Option<(i32, i32)> {
    let (cx, cz) = gravity_center(blueprint);
    let (to_cx, to_cz) = (cx - from.x as f64, cz - from.z as f64);
    let to_center_len = (to_cx * to_cx + to_cz * to_cz).sqrt();

    let half_w = (blueprint.grid_width as f64 / 2.0).max(1.0);
    let half_d = (blueprint.grid_depth as f64 / 2.0).max(1.0);
    let edge_factor = (to_cx.abs() / half_w).max(to_cz.abs() / half_d).clamp(0.0, 1.0);

    let mut candidates: Vec<((i32, i32), f64)> = Vec::with_capacity(DIRECTIONS.len());
    for dir in DIRECTIONS {
        if !can_step(blueprint, from, dir) {
            continue;
        }
        let open = open_cells(blueprint, from, dir, config.open_lookahead.max(1)) as f64;

        let gravity = if to_center_len > f64::EPSILON {
            let (ux, uz) = unit(dir);
            let dot = (ux * to_cx + uz * to_cz) / to_center_len;
            config.center_gravity * dot * edge_factor
        } else {
            0.0
        };

        let jitter = rng.gen::<f64>() * config.jitter;
        let score = (1.0 + open + gravity + jitter).max(MIN_DIRECTION_WEIGHT);
        candidates.push((dir, score));
    }

    if candidates.is_empty() {
        return None;
    }

    let total: f64 = candidates.iter().map(|(_, score)| score).sum();
    let mut draw = rng.gen::<f64>() * total;
    for (dir, score) in &candidates {
        if draw < *score {
            return Some(*dir);
        }
        draw -= score;
    }
    candidates.last().map(|(dir, _)| *dir)
}

/// Turn `current` toward `target` along the shortest arc.
///
/// `factor` is the fraction of the remaining turn taken this frame. Within
/// `epsilon` of the target the heading snaps exactly.
pub fn smooth_rotation(current: f64, target: f64, factor: f64, epsilon: f64) -> f64 {
    let diff = normalize_angle(target - current);
    if diff.abs() < epsilon {
        return normalize_angle(target);
    }
    normalize_angle(current + diff * factor.clamp(0.0, 1.0))
}

/// Push away from neighbours closer than `radius` (world units).
///
/// Only the first `max_neighbors` positions are considered; each pushes
/// with weight `1 - distance / radius`. The sum is scaled by `strength`
/// and `dt`.
pub fn repulsion_push(
    position: WorldPos,
    neighbors: impl IntoIterator<Item = WorldPos>,
    radius: f64,
    strength: f64,
    dt: f64,
    max_neighbors: usize,
) -> (f64, f64) {
    if radius <= 0.0 {
        return (0.0, 0.0);
    }

    let mut push_x = 0.0;
    let mut push_z = 0.0;
    for other in neighbors.into_iter().take(max_neighbors) {
        let dx = position.x - other.x;
        let dz = position.z - other.z;
        let dist = (dx * dx + dz * dz).sqrt();
        if dist >= radius || dist < 1e-6 {
            continue;
        }
        let weight = 1.0 - dist / radius;
        push_x += dx / dist * weight;
        push_z += dz / dist * weight;
    }

    (push_x * strength * dt, push_z * strength * dt)
}

/// The displaced position, or `None` if it would leave walkable ground
pub fn apply_push(blueprint: &RoomBlueprint, position: WorldPos, push: (f64, f64)) -> Option<WorldPos> {
    if push == (0.0, 0.0) {
        return None;
    }
    let moved = WorldPos::new(position.x + push.0, position.z + push.1);
    blueprint.is_walkable_at(moved).then_some(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::CellType;
    use rand::SeedableRng;
    use std::f64::consts::PI;

    fn room() -> RoomBlueprint {
        let mut bp = RoomBlueprint::walled("Steer", 10, 10, 1.0);
        bp.place_prop("cabinet", GridPos::new(6, 4), (1, 1), CellType::Furniture, false, None);
        bp.rebuild_walkable_mask();
        bp
    }

    #[test]
    fn test_diagonal_needs_both_orthogonals() {
        let bp = room();
        // (5,5) -> (6,4) is the cabinet itself
        assert!(!can_step(&bp, GridPos::new(5, 5), (1, -1)));
        // (5,4) -> (6,3): orthogonal (6,4) is the cabinet
        assert!(!can_step(&bp, GridPos::new(5, 4), (1, -1)));
        assert!(can_step(&bp, GridPos::new(5, 4), (0, -1)));
        assert!(can_step(&bp, GridPos::new(3, 3), (1, 1)));
    }

    #[test]
    fn test_open_cells_counts_until_blocked() {
        let bp = room();
        assert_eq!(open_cells(&bp, GridPos::new(1, 4), (1, 0), 10), 4);
        assert_eq!(open_cells(&bp, GridPos::new(1, 4), (1, 0), 2), 2);
        assert_eq!(open_cells(&bp, GridPos::new(1, 4), (-1, 0), 4), 0);
    }

    #[test]
    fn test_pick_walkable_dir_only_returns_open_directions() {
        let bp = room();
        let config = MovementConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let from = GridPos::new(rng.gen_range(1..9), rng.gen_range(1..9));
            if !bp.is_walkable(from) {
                continue;
            }
            if let Some(dir) = pick_walkable_dir(&bp, from, &config, &mut rng) {
                assert!(can_step(&bp, from, dir));
            }
        }
    }

    #[test]
    fn test_pick_walkable_dir_boxed_in() {
        let mut bp = RoomBlueprint::walled("Closet", 3, 3, 1.0);
        bp.rebuild_walkable_mask();
        let mut rng = StdRng::seed_from_u64(1);
        let config = MovementConfig::default();
        assert_eq!(pick_walkable_dir(&bp, GridPos::new(1, 1), &config, &mut rng), None);
    }

    #[test]
    fn test_center_gravity_pulls_inward_from_corner() {
        let bp = RoomBlueprint::walled("Hall", 20, 20, 1.0);
        let config = MovementConfig {
            jitter: 0.0,
            center_gravity: 6.0,
            ..MovementConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        let mut inward = 0;
        for _ in 0..400 {
            if let Some((dx, dz)) = pick_walkable_dir(&bp, GridPos::new(2, 2), &config, &mut rng) {
                if dx + dz > 0 {
                    inward += 1;
                }
            }
        }
        // Uniform choice over the eight directions would give ~150
        assert!(inward > 300, "inward picks: {}", inward);
    }

    #[test]
    fn test_smooth_rotation_takes_short_arc() {
        let next = smooth_rotation(PI - 0.1, -PI + 0.1, 0.5, 1e-3);
        // Crossing the seam: moves up past PI, not back through zero
        assert!(next.abs() > PI - 0.1);
        assert_eq!(smooth_rotation(1.0, 1.0005, 0.1, 1e-3), 1.0005);
    }

    #[test]
    fn test_smooth_rotation_converges() {
        let mut angle = 0.0;
        for _ in 0..200 {
            angle = smooth_rotation(angle, 2.0, 0.2, 1e-4);
        }
        assert_eq!(angle, 2.0);
    }

    #[test]
    fn test_repulsion_push_direction_and_cap() {
        let me = WorldPos::new(0.0, 0.0);
        let push = repulsion_push(me, [WorldPos::new(0.5, 0.0)], 1.0, 1.0, 1.0, 8);
        assert!(push.0 < 0.0);
        assert_eq!(push.1, 0.0);

        let crowd = vec![WorldPos::new(0.5, 0.0); 20];
        let capped = repulsion_push(me, crowd, 1.0, 1.0, 1.0, 8);
        assert!((capped.0 + 8.0 * 0.5).abs() < 1e-9);

        let outside = repulsion_push(me, [WorldPos::new(2.0, 0.0)], 1.0, 1.0, 1.0, 8);
        assert_eq!(outside, (0.0, 0.0));
    }

    #[test]
    fn test_push_into_wall_is_discarded() {
        let bp = room();
        let near_wall = bp.grid_to_world(GridPos::new(1, 5));
        assert!(apply_push(&bp, near_wall, (-0.8, 0.0)).is_none());
        let moved = apply_push(&bp, near_wall, (0.3, 0.0)).unwrap();
        assert!((moved.x - near_wall.x - 0.3).abs() < 1e-12);
    }
}
