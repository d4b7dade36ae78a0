use rand::Rng;

use crate::blueprint::{GridPos, RoomBlueprint, WorldPos};
use crate::spatial::{heading, nearest_walkable_cell};

use super::steering::{can_step, pick_walkable_dir, unit};
use super::{BotMotion, Step, StepEnv};

/// Random grid walk, the default idle behavior in rooms with a bot mask.
///
/// The bot moves one whole cell at a time. Its position is always rebuilt
/// from the fixed center of `cell` plus `dir * progress`, never accumulated
/// frame by frame, so it cannot drift off the cell lattice.
#[derive(Debug, Clone)]
pub struct GridWalk {
    /// Cell the current step started from
    cell: GridPos,
    dir: Option<(i32, i32)>,
    /// Fraction of the current step completed (0..1)
    progress: f64,
    steps_remaining: u32,
    wait_timer: f64,
    /// Offset from the lattice (world units), from joining off-center and from repulsion
    nudge: (f64, f64),
}

impl GridWalk {
    /// Start walking from the current position without a visible jump.
    ///
    /// A bot left on a blocked cell (a couch it was sent to) hops to the
    /// nearest open cell instead.
    pub fn starting_at(blueprint: &RoomBlueprint, position: WorldPos) -> Self {
        let mut cell = blueprint.world_to_grid(position);
        let mut nudge = (0.0, 0.0);
        if blueprint.is_walkable(cell) {
            let center = blueprint.grid_to_world(cell);
            nudge = (position.x - center.x, position.z - center.z);
        } else if let Some(open) = nearest_walkable_cell(blueprint, cell) {
            cell = open;
        }
        Self {
            cell,
            dir: None,
            progress: 0.0,
            steps_remaining: 0,
            wait_timer: 0.0,
            nudge,
        }
    }

    pub fn cell(&self) -> GridPos {
        self.cell
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_waiting(&self) -> bool {
        self.wait_timer > 0.0
    }

    fn start_wait(&mut self, env: &mut StepEnv) {
        self.dir = None;
        self.progress = 0.0;
        self.wait_timer = env.wait_duration();
    }

    /// Choose a new direction and step count, or wait if boxed in
    fn repick(&mut self, env: &mut StepEnv) {
        self.progress = 0.0;
        match pick_walkable_dir(env.blueprint, self.cell, env.config, env.rng) {
            Some(dir) => {
                let (min, max) = env.config.step_range();
                self.dir = Some(dir);
                self.steps_remaining = env.rng.gen_range(min..=max);
            }
            None => self.start_wait(env),
        }
    }

    /// Lattice position for the current cell, direction and progress
    fn base_position(&self, env: &StepEnv) -> WorldPos {
        let center = env.blueprint.grid_to_world(self.cell);
        match self.dir {
            Some(dir) => {
                let step = env.blueprint.cell_size * self.progress;
                WorldPos::new(
                    center.x + dir.0 as f64 * step,
                    center.z + dir.1 as f64 * step,
                )
            }
            None => center,
        }
    }

    /// Write the position into `motion`; drops the nudge if it would leave walkable ground
    fn place(&mut self, motion: &mut BotMotion, env: &StepEnv) {
        let base = self.base_position(env);
        let nudged = WorldPos::new(base.x + self.nudge.0, base.z + self.nudge.1);
        if env.blueprint.is_walkable_at(nudged) {
            motion.set_position(nudged);
        } else {
            self.nudge = (0.0, 0.0);
            motion.set_position(base);
        }
    }

    pub fn update(&mut self, motion: &mut BotMotion, env: &mut StepEnv, dt: f64) -> Step {
        let settle = (1.0 - env.config.nudge_decay * dt).max(0.0);
        self.nudge = (self.nudge.0 * settle, self.nudge.1 * settle);

        if self.wait_timer > 0.0 {
            self.wait_timer -= dt;
            self.place(motion, env);
            return Step::Still;
        }

        if self.dir.is_none() {
            self.repick(env);
        }
        let Some(mut dir) = self.dir else {
            self.place(motion, env);
            return Step::Still;
        };

        // The next cell closed up under us: choose again right away
        if !can_step(env.blueprint, self.cell, dir) {
            self.repick(env);
            match self.dir {
                Some(next) => dir = next,
                None => {
                    self.place(motion, env);
                    return Step::Still;
                }
            }
        }

        let (ux, uz) = (dir.0 as f64, dir.1 as f64);
        let step_length = env.blueprint.cell_size * (ux * ux + uz * uz).sqrt();
        self.progress += env.config.wander_speed * dt / step_length;

        while self.progress >= 1.0 {
            self.cell = self.cell.offset(dir.0, dir.1);
            self.progress -= 1.0;
            self.steps_remaining = self.steps_remaining.saturating_sub(1);

            if self.steps_remaining == 0 {
                self.start_wait(env);
                break;
            }
            if !can_step(env.blueprint, self.cell, dir) {
                self.repick(env);
                break;
            }
        }

        if let Some(current) = self.dir {
            let (hx, hz) = unit(current);
            motion.target_facing = heading(hx, hz);
        }
        self.place(motion, env);
        Step::Moved
    }

    /// Accept a repulsion push into the nudge, unless it would exceed `max_nudge`
    pub fn absorb_push(&mut self, push: (f64, f64), max_nudge: f64) -> bool {
        let next = (self.nudge.0 + push.0, self.nudge.1 + push.1);
        if (next.0 * next.0 + next.1 * next.1).sqrt() > max_nudge {
            return false;
        }
        self.nudge = next;
        true
    }
}

/// Free wander for rooms without a bot mask: walk straight to a random
/// point near the room's walkable center, pause, repeat.
#[derive(Debug, Clone, Default)]
pub struct Drift {
    target: Option<WorldPos>,
    wait_timer: f64,
}

/// Attempts at finding a walkable drift destination before waiting instead
const DRIFT_PICK_ATTEMPTS: usize = 8;

impl Drift {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<WorldPos> {
        self.target
    }

    fn pick_target(&self, env: &mut StepEnv) -> Option<WorldPos> {
        let radius = env.config.drift_radius.max(0.0);
        for _ in 0..DRIFT_PICK_ATTEMPTS {
            let point = match env.blueprint.walkable_center {
                Some(center) => {
                    let center = env.blueprint.grid_to_world(center);
                    let angle = env.rng.gen_range(0.0..std::f64::consts::TAU);
                    let r = radius * env.rng.gen::<f64>().sqrt();
                    WorldPos::new(center.x + angle.sin() * r, center.z + angle.cos() * r)
                }
                None => {
                    // Small square around the room center
                    let center = env.blueprint.world_center();
                    let half = radius / 2.0;
                    WorldPos::new(
                        center.x + env.rng.gen_range(-half..=half),
                        center.z + env.rng.gen_range(-half..=half),
                    )
                }
            };
            if env.blueprint.is_walkable_at(point) {
                return Some(point);
            }
        }
        None
    }

    pub fn update(&mut self, motion: &mut BotMotion, env: &mut StepEnv, dt: f64, typing_pause: bool) -> Step {
        if self.wait_timer > 0.0 {
            self.wait_timer -= dt;
            return Step::Still;
        }

        if self.target.is_none() {
            self.target = self.pick_target(env);
            if self.target.is_none() {
                self.wait_timer = env.wait_duration();
                return Step::Still;
            }
        }
        let Some(target) = self.target else {
            return Step::Still;
        };

        let position = motion.position();
        let (dx, dz) = (target.x - position.x, target.z - position.z);
        let distance = (dx * dx + dz * dz).sqrt();
        if distance > f64::EPSILON {
            motion.target_facing = heading(dx, dz);
        }

        // Typing freezes translation but the bot still turns
        if typing_pause {
            return Step::Still;
        }

        let step = env.config.wander_speed * dt;
        if distance <= step {
            motion.set_position(target);
            self.target = None;
            self.wait_timer = env.wait_duration();
            return Step::Moved;
        }

        let next = WorldPos::new(position.x + dx / distance * step, position.z + dz / distance * step);
        if !env.blueprint.is_walkable_at(next) {
            self.target = None;
            self.wait_timer = env.wait_duration();
            return Step::Still;
        }
        motion.set_position(next);
        Step::Moved
    }
}
