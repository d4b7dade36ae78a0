use crate::blueprint::WorldPos;
use crate::spatial::heading;
use crate::state::AnimTarget;

use super::steering::{unit, DIRECTIONS};
use super::{BotMotion, Step, StepEnv};

/// Walk to a scripted destination (coffee machine, couch, ...).
///
/// Far from the target the bot steers greedily along whichever of the
/// eight grid directions keeps it on walkable ground and best lines up
/// with the straight line; close in it interpolates directly, since the
/// target itself may sit on furniture.
#[derive(Debug, Clone)]
pub struct TargetWalk {
    target: AnimTarget,
    arrived: bool,
}

impl TargetWalk {
    pub fn new(target: AnimTarget) -> Self {
        Self {
            target,
            arrived: false,
        }
    }

    pub fn target(&self) -> &AnimTarget {
        &self.target
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    /// Arrived and pinned in place
    pub fn is_frozen(&self) -> bool {
        self.arrived && self.target.freeze_when_arrived
    }

    pub fn update(&mut self, motion: &mut BotMotion, env: &mut StepEnv, dt: f64) -> Step {
        let goal = WorldPos::new(self.target.x, self.target.z);
        if self.is_frozen() {
            motion.set_position(goal);
            return Step::Still;
        }

        let position = motion.position();
        let (dx, dz) = (goal.x - position.x, goal.z - position.z);
        let distance = (dx * dx + dz * dz).sqrt();
        let cells = distance / env.blueprint.cell_size;

        if cells < env.config.target_arrive_threshold {
            self.arrived = true;
            if self.target.freeze_when_arrived {
                motion.set_position(goal);
            }
            return Step::Still;
        }
        self.arrived = false;

        let step = env.config.anim_target_speed * dt;
        if cells > env.config.target_far_threshold {
            let desired = (dx / distance, dz / distance);
            let mut best: Option<((f64, f64), f64)> = None;
            for dir in DIRECTIONS {
                let u = unit(dir);
                let candidate = WorldPos::new(position.x + u.0 * step, position.z + u.1 * step);
                if !env.blueprint.is_walkable_at(candidate) {
                    continue;
                }
                let alignment = u.0 * desired.0 + u.1 * desired.1;
                if best.map_or(true, |(_, a)| alignment > a) {
                    best = Some((u, alignment));
                }
            }

            // Nowhere to go this frame: hold still and try again next frame
            let Some((u, _)) = best else {
                return Step::Still;
            };
            motion.set_position(WorldPos::new(position.x + u.0 * step, position.z + u.1 * step));
            motion.target_facing = heading(u.0, u.1);
            return Step::Moved;
        }

        let t = (step / distance).min(1.0);
        motion.set_position(position.lerp(&goal, t));
        motion.target_facing = heading(dx, dz);
        Step::Moved
    }
}
