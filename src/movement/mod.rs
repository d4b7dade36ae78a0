//! Per-bot movement state machine.
//!
//! Every frame each bot runs exactly one behavior, chosen by priority:
//! meeting gather, then scripted anim target, then a navigator path, then
//! idle wander (free drift in rooms without a bot mask, grid walk
//! otherwise). Rotation smoothing, repulsion and the bounce offset run on
//! top of whichever behavior was active.
//!
//! Bots are processed one at a time in arena order and each writes its
//! pose into the shared `PositionRegistry` straight away, so repulsion for
//! a bot later in the frame sees neighbours that already moved this frame.

pub mod gather;
pub mod path;
pub mod registry;
pub mod steering;
pub mod target;
pub mod wander;

pub use gather::{meeting_route, Gather};
pub use path::PathFollow;
pub use registry::{BotPosition, PositionRegistry};
pub use target::TargetWalk;
pub use wander::{Drift, GridWalk};

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::animation::{advance_walk_phase, bounce_offset};
use crate::blueprint::{RoomBlueprint, WorldPos};
use crate::spatial::{nearest_walkable_cell, NavigationPath, SpatialManager, SpatialNavigator, Zone};
use crate::state::{AnimTarget, MeetingCoordinator, MeetingSeat, SessionActivity};

use steering::{apply_push, repulsion_push, smooth_rotation};

/// Movement tuning. Speeds are world units per second, distances in cells
/// unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub wander_speed: f64,
    pub gather_speed: f64,
    pub path_speed: f64,
    pub anim_target_speed: f64,

    pub meeting_final_threshold: f64,
    pub meeting_waypoint_threshold: f64,
    pub target_far_threshold: f64,
    pub target_arrive_threshold: f64,
    pub path_arrive_threshold: f64,

    /// Cells walked per wander leg
    pub min_steps: u32,
    pub max_steps: u32,
    /// Pause between wander legs (seconds)
    pub min_wait: f64,
    pub max_wait: f64,

    /// Open cells counted ahead when scoring a direction
    pub open_lookahead: u32,
    pub center_gravity: f64,
    pub jitter: f64,
    /// Largest offset from the cell lattice a wandering bot may carry
    pub max_nudge: f64,
    /// Per-second decay of that offset
    pub nudge_decay: f64,
    /// Radius of free drift around the walkable center (world units)
    pub drift_radius: f64,

    pub repulsion_radius: f64,
    /// Push per second at zero distance, in cells
    pub repulsion_strength: f64,
    pub repulsion_max_neighbors: usize,

    /// Fraction of the remaining turn taken per second
    pub rotation_speed: f64,
    pub rotation_epsilon: f64,
    pub walk_phase_rate: f64,
    pub walk_phase_decay: f64,

    pub seed: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            wander_speed: 0.9,
            gather_speed: 1.8,
            path_speed: 1.5,
            anim_target_speed: 1.4,
            meeting_final_threshold: 0.3,
            meeting_waypoint_threshold: 0.5,
            target_far_threshold: 0.8,
            target_arrive_threshold: 0.4,
            path_arrive_threshold: 0.3,
            min_steps: 1,
            max_steps: 4,
            min_wait: 0.8,
            max_wait: 3.0,
            open_lookahead: 4,
            center_gravity: 1.5,
            jitter: 1.5,
            max_nudge: 0.3,
            nudge_decay: 0.6,
            drift_radius: 1.5,
            repulsion_radius: 1.5,
            repulsion_strength: 2.0,
            repulsion_max_neighbors: 8,
            rotation_speed: 8.0,
            rotation_epsilon: 0.01,
            walk_phase_rate: 10.0,
            walk_phase_decay: 5.0,
            seed: 0x5eed,
        }
    }
}

impl MovementConfig {
    /// Wander leg length bounds, at least one step
    pub fn step_range(&self) -> (u32, u32) {
        let min = self.min_steps.max(1);
        (min, self.max_steps.max(min))
    }

    fn wait_range(&self) -> (f64, f64) {
        let min = self.min_wait.max(0.0);
        (min, self.max_wait.max(min))
    }
}

/// Continuous kinematic state of one bot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotMotion {
    pub x: f64,
    pub z: f64,
    pub facing: f64,
    pub target_facing: f64,
    /// Stride angle for the bounce animation
    pub walk_phase: f64,
    pub moving: bool,
}

impl BotMotion {
    pub fn at(position: WorldPos, facing: f64) -> Self {
        Self {
            x: position.x,
            z: position.z,
            facing,
            target_facing: facing,
            walk_phase: 0.0,
            moving: false,
        }
    }

    pub fn position(&self) -> WorldPos {
        WorldPos::new(self.x, self.z)
    }

    pub fn set_position(&mut self, position: WorldPos) {
        self.x = position.x;
        self.z = position.z;
    }
}

/// Outcome of one behavior update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moved,
    Still,
    /// The behavior has nothing left to do
    Finished,
}

/// Read-only room data and the engine's rng, lent to a behavior for one update
pub struct StepEnv<'a> {
    pub blueprint: &'a RoomBlueprint,
    pub navigator: &'a SpatialNavigator,
    pub config: &'a MovementConfig,
    pub rng: &'a mut StdRng,
}

impl StepEnv<'_> {
    /// Random pause length within the configured window
    pub fn wait_duration(&mut self) -> f64 {
        let (min, max) = self.config.wait_range();
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..max)
    }
}

/// What a bot should be doing this frame
enum Intent<'a> {
    Gather { seat: MeetingSeat, visitor: bool },
    Target(AnimTarget),
    Path(&'a NavigationPath),
    Drift,
    Wander,
}

/// Collaborators consulted when choosing each bot's behavior
pub struct TickContext<'a> {
    /// Room being simulated, compared against bots' home rooms
    pub room_id: &'a str,
    pub meetings: &'a dyn MeetingCoordinator,
    pub activity: &'a dyn SessionActivity,
}

/// The behavior a bot is running
#[derive(Debug, Clone)]
pub enum Behavior {
    Wandering(GridWalk),
    Drifting(Drift),
    Gathering(Gather),
    WalkingToTarget(TargetWalk),
    FollowingPath(PathFollow),
}

impl Behavior {
    /// Idle behavior for a room
    fn idle(blueprint: &RoomBlueprint, position: WorldPos) -> Self {
        if blueprint.has_walkable_mask() {
            Behavior::Wandering(GridWalk::starting_at(blueprint, position))
        } else {
            Behavior::Drifting(Drift::new())
        }
    }

    fn start(intent: Intent, blueprint: &RoomBlueprint, position: WorldPos) -> Self {
        match intent {
            Intent::Gather { seat, visitor } => Behavior::Gathering(Gather::new(seat, visitor)),
            Intent::Target(target) => Behavior::WalkingToTarget(TargetWalk::new(target)),
            Intent::Path(path) => Behavior::FollowingPath(PathFollow::new(path.clone())),
            Intent::Drift => Behavior::Drifting(Drift::new()),
            Intent::Wander => Behavior::Wandering(GridWalk::starting_at(blueprint, position)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Behavior::Wandering(_) => "wandering",
            Behavior::Drifting(_) => "drifting",
            Behavior::Gathering(_) => "gathering",
            Behavior::WalkingToTarget(_) => "walking_to_target",
            Behavior::FollowingPath(_) => "following_path",
        }
    }

    /// Walking somewhere on purpose rather than ambling
    fn is_purposeful(&self) -> bool {
        matches!(
            self,
            Behavior::Gathering(_) | Behavior::WalkingToTarget(_) | Behavior::FollowingPath(_)
        )
    }

    /// Seated and frozen bots hold their exact pose
    fn accepts_repulsion(&self) -> bool {
        match self {
            Behavior::Gathering(gather) => !gather.is_seated(),
            Behavior::WalkingToTarget(walk) => !walk.is_frozen(),
            _ => true,
        }
    }

    fn absorb_push(&mut self, push: (f64, f64), max_nudge: f64) -> bool {
        match self {
            Behavior::Wandering(walk) => walk.absorb_push(push, max_nudge),
            _ => true,
        }
    }

    fn satisfies(&self, intent: &Intent) -> bool {
        match (self, intent) {
            (Behavior::Gathering(gather), Intent::Gather { seat, .. }) => gather.seat() == seat,
            (Behavior::WalkingToTarget(walk), Intent::Target(target)) => walk.target() == target,
            (Behavior::FollowingPath(follow), Intent::Path(path)) => follow.path() == *path,
            (Behavior::Drifting(_), Intent::Drift) | (Behavior::Wandering(_), Intent::Wander) => true,
            _ => false,
        }
    }

    fn update(&mut self, motion: &mut BotMotion, env: &mut StepEnv, dt: f64, typing: bool) -> Step {
        match self {
            Behavior::Wandering(walk) => walk.update(motion, env, dt),
            Behavior::Drifting(drift) => drift.update(motion, env, dt, typing),
            Behavior::Gathering(gather) => gather.update(motion, env, dt),
            Behavior::WalkingToTarget(walk) => walk.update(motion, env, dt),
            Behavior::FollowingPath(follow) => follow.update(motion, env, dt),
        }
    }
}

fn intent_for<'a>(
    session_key: &str,
    blueprint: &RoomBlueprint,
    manager: &'a SpatialManager,
    ctx: &TickContext,
) -> Intent<'a> {
    if ctx.meetings.is_meeting_active() {
        if let Some(seat) = ctx.meetings.seat_for(session_key) {
            let visitor = ctx
                .meetings
                .home_room(session_key)
                .is_some_and(|home| home != ctx.room_id);
            return Intent::Gather { seat, visitor };
        }
    }
    if let Some(target) = ctx.activity.anim_target(session_key) {
        return Intent::Target(target);
    }
    if let Some(path) = manager.active_path(session_key) {
        return Intent::Path(path);
    }
    if blueprint.has_walkable_mask() {
        Intent::Wander
    } else {
        Intent::Drift
    }
}

/// One bot's entry in the engine arena
#[derive(Debug)]
struct BotSlot {
    session_key: String,
    motion: BotMotion,
    behavior: Behavior,
}

/// Per-frame pose of a bot for output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSnapshot {
    pub session_key: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub facing: f64,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
}

/// Drives every bot in one room
pub struct MovementEngine {
    config: MovementConfig,
    rng: StdRng,
    slots: Vec<Option<BotSlot>>,
    index: HashMap<String, usize>,
    free: Vec<usize>,
    elapsed: f64,
}

impl MovementEngine {
    pub fn new(config: MovementConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            slots: Vec::new(),
            index: HashMap::new(),
            free: Vec::new(),
            elapsed: 0.0,
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn slot(&self, session_key: &str) -> Option<&BotSlot> {
        let i = *self.index.get(session_key)?;
        self.slots.get(i)?.as_ref()
    }

    pub fn motion(&self, session_key: &str) -> Option<&BotMotion> {
        self.slot(session_key).map(|slot| &slot.motion)
    }

    pub fn behavior(&self, session_key: &str) -> Option<&Behavior> {
        self.slot(session_key).map(|slot| &slot.behavior)
    }

    pub fn behavior_name(&self, session_key: &str) -> Option<&'static str> {
        self.behavior(session_key).map(Behavior::name)
    }

    /// Place a bot in the room, registering it with the spatial manager.
    ///
    /// A blocked spawn point is moved to the nearest walkable cell. Adding a
    /// known bot again teleports it and restarts its idle behavior.
    pub fn add_bot(
        &mut self,
        session_key: &str,
        position: WorldPos,
        facing: f64,
        manager: &mut SpatialManager,
        registry: &mut PositionRegistry,
    ) {
        let blueprint = Arc::clone(manager.blueprint());
        let mut position = position;
        if !blueprint.is_walkable_at(position) {
            if let Some(cell) = nearest_walkable_cell(&blueprint, blueprint.world_to_grid(position)) {
                debug!("Bot '{}' spawned on a blocked cell, moved to {:?}", session_key, cell);
                position = blueprint.grid_to_world(cell);
            }
        }

        let slot = BotSlot {
            session_key: session_key.to_string(),
            motion: BotMotion::at(position, facing),
            behavior: Behavior::idle(&blueprint, position),
        };
        match self.index.get(session_key).copied() {
            Some(i) => self.slots[i] = Some(slot),
            None => {
                let i = match self.free.pop() {
                    Some(i) => {
                        self.slots[i] = Some(slot);
                        i
                    }
                    None => {
                        self.slots.push(Some(slot));
                        self.slots.len() - 1
                    }
                };
                self.index.insert(session_key.to_string(), i);
            }
        }

        let cell = blueprint.world_to_grid(position);
        manager.add_bot(session_key, cell.x, cell.z, facing);
        registry.set(
            session_key,
            BotPosition {
                x: position.x,
                y: 0.0,
                z: position.z,
                facing,
            },
        );
    }

    /// Remove a bot everywhere; returns false if it was unknown
    pub fn remove_bot(
        &mut self,
        session_key: &str,
        manager: &mut SpatialManager,
        registry: &mut PositionRegistry,
    ) -> bool {
        manager.remove_bot(session_key);
        registry.remove(session_key);
        let Some(i) = self.index.remove(session_key) else {
            return false;
        };
        self.slots[i] = None;
        self.free.push(i);
        true
    }

    /// Remove every bot (room unfocus)
    pub fn clear(&mut self, manager: &mut SpatialManager, registry: &mut PositionRegistry) {
        let keys: Vec<String> = self.index.keys().cloned().collect();
        for key in keys {
            self.remove_bot(&key, manager, registry);
        }
    }

    /// Advance every bot by `dt` seconds
    pub fn tick(
        &mut self,
        dt: f64,
        manager: &mut SpatialManager,
        registry: &mut PositionRegistry,
        ctx: &TickContext,
    ) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.elapsed += dt;
        let blueprint = Arc::clone(manager.blueprint());
        let cell_size = blueprint.cell_size;
        let config = &self.config;

        for slot in self.slots.iter_mut().flatten() {
            let key = slot.session_key.as_str();
            let typing = ctx.activity.is_typing(key);

            let step = {
                let intent = intent_for(key, &blueprint, manager, ctx);
                if !slot.behavior.satisfies(&intent) {
                    let next = Behavior::start(intent, &blueprint, slot.motion.position());
                    debug!("Bot '{}': {} -> {}", key, slot.behavior.name(), next.name());
                    slot.behavior = next;
                }
                let mut env = StepEnv {
                    blueprint: &blueprint,
                    navigator: manager.navigator(),
                    config,
                    rng: &mut self.rng,
                };
                slot.behavior.update(&mut slot.motion, &mut env, dt, typing)
            };
            if step == Step::Finished {
                manager.clear_active_path(key);
            }

            let motion = &mut slot.motion;
            motion.moving = step == Step::Moved;
            let turn = (config.rotation_speed * dt).min(1.0);
            motion.facing = smooth_rotation(motion.facing, motion.target_facing, turn, config.rotation_epsilon);
            motion.walk_phase = advance_walk_phase(
                motion.walk_phase,
                motion.moving,
                dt,
                config.walk_phase_rate,
                config.walk_phase_decay,
            );

            if slot.behavior.accepts_repulsion() {
                // Candidates come from the cell-level index; exact positions from the registry
                let neighbors: Vec<WorldPos> = manager
                    .nearby_bot_candidates(key, config.repulsion_radius + 1.0)
                    .into_iter()
                    .take(config.repulsion_max_neighbors)
                    .filter_map(|hit| registry.get(&hit.id).map(|p| WorldPos::new(p.x, p.z)))
                    .collect();
                let push = repulsion_push(
                    motion.position(),
                    neighbors,
                    config.repulsion_radius * cell_size,
                    config.repulsion_strength * cell_size,
                    dt,
                    config.repulsion_max_neighbors,
                );
                if let Some(moved) = apply_push(&blueprint, motion.position(), push) {
                    if slot.behavior.absorb_push(push, config.max_nudge * cell_size) {
                        motion.set_position(moved);
                    }
                }
            }

            let active_walk = motion.moving && slot.behavior.is_purposeful();
            let y = bounce_offset(motion.walk_phase, motion.moving, active_walk, typing, self.elapsed);
            registry.set(
                key,
                BotPosition {
                    x: motion.x,
                    y,
                    z: motion.z,
                    facing: motion.facing,
                },
            );

            let cell = blueprint.world_to_grid(motion.position());
            let changed_cell = manager.bot(key).map_or(true, |info| info.grid_pos() != cell);
            if changed_cell {
                manager.update_bot_position(key, cell.x, cell.z, motion.facing);
            } else {
                manager.set_facing(key, motion.facing);
            }
        }
    }

    /// Poses of every bot, in arena order
    pub fn snapshots(&self, registry: &PositionRegistry, manager: &SpatialManager) -> Vec<BotSnapshot> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| {
                let key = slot.session_key.as_str();
                let pose = registry.get(key).copied().unwrap_or(BotPosition {
                    x: slot.motion.x,
                    y: 0.0,
                    z: slot.motion.z,
                    facing: slot.motion.facing,
                });
                BotSnapshot {
                    session_key: slot.session_key.clone(),
                    x: pose.x,
                    y: pose.y,
                    z: pose.z,
                    facing: pose.facing,
                    state: slot.behavior.name(),
                    zone: manager.bot(key).map(|info| info.zone),
                }
            })
            .collect()
    }
}
