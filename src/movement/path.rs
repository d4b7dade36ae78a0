use crate::spatial::{heading, NavigationPath};

use super::{BotMotion, Step, StepEnv};

/// Walk a navigator path one waypoint at a time
#[derive(Debug, Clone)]
pub struct PathFollow {
    path: NavigationPath,
    index: usize,
}

impl PathFollow {
    pub fn new(path: NavigationPath) -> Self {
        Self { path, index: 0 }
    }

    pub fn path(&self) -> &NavigationPath {
        &self.path
    }

    pub fn remaining(&self) -> usize {
        self.path.len().saturating_sub(self.index)
    }

    pub fn update(&mut self, motion: &mut BotMotion, env: &mut StepEnv, dt: f64) -> Step {
        let speed = if self.path.speed > 0.0 {
            self.path.speed
        } else {
            env.config.path_speed
        };

        let position = motion.position();
        loop {
            let Some(waypoint) = self.path.waypoints.get(self.index) else {
                return Step::Finished;
            };
            let target = env.blueprint.grid_to_world(*waypoint);
            let (dx, dz) = (target.x - position.x, target.z - position.z);
            let distance = (dx * dx + dz * dz).sqrt();

            if distance / env.blueprint.cell_size < env.config.path_arrive_threshold {
                self.index += 1;
                continue;
            }

            let t = (speed * dt / distance).min(1.0);
            motion.set_position(position.lerp(&target, t));
            motion.target_facing = heading(dx, dz);
            return Step::Moved;
        }
    }
}
