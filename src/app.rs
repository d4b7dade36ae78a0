use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::animation::AnimationLoop;
use crate::blueprint::{RoomBlueprint, WorldPos};
use crate::config::SimConfig;
use crate::event::{create_event_queue, EventReceiver, FileWatcher, SimEvent};
use crate::movement::{BotSnapshot, MovementEngine, PositionRegistry, TickContext};
use crate::spatial::SpatialManager;
use crate::state::{ActivityBoard, MeetingBoard};

/// One focused room: the spatial manager, the movement engine and the
/// collaborator state they read
pub struct Simulation {
    room_id: String,
    manager: SpatialManager,
    engine: MovementEngine,
    registry: PositionRegistry,
    meetings: MeetingBoard,
    activity: ActivityBoard,
    tick: u64,
    elapsed: f64,
}

/// A JSON-lines output record
#[derive(Debug, Serialize)]
pub struct Frame {
    pub tick: u64,
    pub elapsed: f64,
    pub bots: Vec<BotSnapshot>,
}

impl Simulation {
    /// Focus a room
    pub fn new(room_id: &str, blueprint: Arc<RoomBlueprint>, config: &SimConfig) -> Self {
        Self {
            room_id: room_id.to_string(),
            manager: SpatialManager::new(blueprint, config),
            engine: MovementEngine::new(config.movement.clone()),
            registry: PositionRegistry::new(),
            meetings: MeetingBoard::new(),
            activity: ActivityBoard::new(),
            tick: 0,
            elapsed: 0.0,
        }
    }

    pub fn manager(&self) -> &SpatialManager {
        &self.manager
    }

    pub fn engine(&self) -> &MovementEngine {
        &self.engine
    }

    pub fn registry(&self) -> &PositionRegistry {
        &self.registry
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Apply one input event
    pub fn apply_event(&mut self, event: SimEvent) {
        match event {
            SimEvent::BotJoined(joined) => {
                if let Some(home) = &joined.home_room {
                    self.meetings.set_home_room(&joined.session_key, home);
                }
                self.engine.add_bot(
                    &joined.session_key,
                    WorldPos::new(joined.x, joined.z),
                    joined.facing,
                    &mut self.manager,
                    &mut self.registry,
                );
                info!("Bot '{}' joined", joined.session_key);
            }
            SimEvent::BotLeft(left) => {
                if self
                    .engine
                    .remove_bot(&left.session_key, &mut self.manager, &mut self.registry)
                {
                    info!("Bot '{}' left", left.session_key);
                }
                self.meetings.forget(&left.session_key);
                self.activity.forget(&left.session_key);
            }
            SimEvent::Typing(typing) => self.activity.set_typing(&typing.session_key, typing.typing),
            SimEvent::AnimTarget(set) => self.activity.set_anim_target(&set.session_key, set.target()),
            SimEvent::ClearAnimTarget(clear) => {
                self.activity.clear_anim_target(&clear.session_key);
            }
            SimEvent::MeetingStarted(meeting) => {
                if meeting.room_id != self.room_id {
                    debug!("Ignoring meeting in room '{}'", meeting.room_id);
                    return;
                }
                let seats = meeting
                    .seats
                    .into_iter()
                    .map(|assignment| (assignment.session_key, assignment.seat));
                self.meetings.start(&meeting.room_id, seats);
            }
            SimEvent::MeetingEnded => self.meetings.end(),
            SimEvent::Navigate(nav) => {
                let path = match (&nav.prop_id, &nav.zone) {
                    (Some(prop_id), _) => self.manager.navigate_to(&nav.session_key, prop_id, nav.speed),
                    (None, Some(zone)) => self.manager.navigate_to_zone(&nav.session_key, zone, nav.speed),
                    (None, None) => None,
                };
                match path {
                    Some(path) => debug!("Bot '{}' navigating, {} waypoints", nav.session_key, path.len()),
                    None => debug!("Bot '{}' has no route for {:?}", nav.session_key, nav),
                }
            }
        }
    }

    /// Advance one frame
    pub fn step(&mut self, dt: f64) {
        let ctx = TickContext {
            room_id: &self.room_id,
            meetings: &self.meetings,
            activity: &self.activity,
        };
        self.engine
            .tick(dt, &mut self.manager, &mut self.registry, &ctx);
        self.elapsed += dt.max(0.0);
        self.tick += 1;
        self.manager.refresh_due_awareness(self.elapsed);
    }

    pub fn frame(&self) -> Frame {
        Frame {
            tick: self.tick,
            elapsed: self.elapsed,
            bots: self.engine.snapshots(&self.registry, &self.manager),
        }
    }

    /// Unfocus the room: every bot is dropped and the registry emptied
    pub fn shutdown(&mut self) {
        self.engine.clear(&mut self.manager, &mut self.registry);
        self.manager.clear_bots();
        self.registry.clear();
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub room_id: String,
    pub events_path: Option<PathBuf>,
    pub demo_mode: bool,
    /// Bots the demo generator spawns
    pub demo_bots: usize,
    pub fps: u32,
    /// Stop after this many frames
    pub max_ticks: Option<u64>,
    /// Write a frame every N ticks
    pub emit_every: u64,
    pub sim: SimConfig,
}

/// Headless runner: ingests events, ticks the room and prints frames
pub struct App {
    config: AppConfig,
    simulation: Simulation,
    animation_loop: AnimationLoop,
}

impl App {
    pub fn new(config: AppConfig, blueprint: Arc<RoomBlueprint>) -> Self {
        let simulation = Simulation::new(&config.room_id, Arc::clone(&blueprint), &config.sim);
        Self {
            animation_loop: AnimationLoop::new(config.fps),
            simulation,
            config,
        }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub async fn run(&mut self) -> Result<()> {
        let (event_tx, mut event_rx) = create_event_queue();

        let _watcher = match &self.config.events_path {
            Some(path) => Some(
                FileWatcher::new(path, true, event_tx.inner())
                    .with_context(|| format!("watching {}", path.display()))?,
            ),
            None => None,
        };
        if self.config.demo_mode {
            let blueprint = Arc::clone(self.simulation.manager().blueprint());
            tokio::spawn(crate::demo::generate_demo_events(
                event_tx.inner(),
                blueprint,
                self.config.sim.movement.seed,
                self.config.demo_bots,
            ));
        }

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut stdout = io::stdout();
        loop {
            if self.config.max_ticks.is_some_and(|max| self.simulation.tick_count() >= max) {
                break;
            }

            self.process_incoming_events(&mut event_rx);

            if self.animation_loop.should_tick() {
                let dt = self.animation_loop.delta_time();
                self.simulation.step(dt);
                self.animation_loop.frame_done();

                if self.simulation.tick_count() % self.config.emit_every.max(1) == 0 {
                    write_frame(&mut stdout, &self.simulation.frame())?;
                }
            }

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
                _ = tokio::time::sleep(self.animation_loop.time_until_next_frame()) => {}
            }
        }

        info!(
            "Stopping after {} ticks in {:.1}s ({} fps)",
            self.simulation.tick_count(),
            self.animation_loop.elapsed(),
            self.animation_loop.fps()
        );
        self.simulation.shutdown();
        Ok(())
    }

    /// Process incoming events from the queue
    fn process_incoming_events(&mut self, rx: &mut EventReceiver) {
        for event in rx.drain() {
            self.simulation.apply_event(event);
        }
    }
}

fn write_frame(out: &mut impl Write, frame: &Frame) -> Result<()> {
    serde_json::to_writer(&mut *out, frame).context("encoding frame")?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::GridPos;
    use crate::demo::{demo_blueprint, DEMO_ROOM_ID};
    use crate::event::parse_line;

    fn simulation() -> Simulation {
        let blueprint = Arc::new(demo_blueprint().unwrap());
        Simulation::new(DEMO_ROOM_ID, blueprint, &SimConfig::default())
    }

    fn feed(sim: &mut Simulation, lines: &[&str]) {
        for line in lines {
            sim.apply_event(parse_line(line).unwrap());
        }
    }

    #[test]
    fn test_join_tick_and_leave() {
        let mut sim = simulation();
        let spawn = sim.manager().blueprint().grid_to_world(GridPos::new(2, 6));
        let line = format!(
            r#"{{"type": "bot_joined", "session_key": "alpha", "x": {}, "z": {}}}"#,
            spawn.x, spawn.z
        );
        feed(&mut sim, &[&line]);
        for _ in 0..30 {
            sim.step(1.0 / 30.0);
        }
        let frame = sim.frame();
        assert_eq!(frame.tick, 30);
        assert_eq!(frame.bots.len(), 1);
        assert!(sim.manager().bot("alpha").is_some());

        feed(&mut sim, &[r#"{"type": "bot_left", "session_key": "alpha"}"#]);
        assert!(sim.frame().bots.is_empty());
        assert!(sim.registry().is_empty());
    }

    #[test]
    fn test_navigate_event_sets_active_path() {
        let mut sim = simulation();
        feed(
            &mut sim,
            &[
                r#"{"type": "bot_joined", "session_key": "alpha", "x": 0.0, "z": 0.0}"#,
                r#"{"type": "navigate", "session_key": "alpha", "prop_id": "coffee-machine"}"#,
            ],
        );
        assert!(sim.manager().active_path("alpha").is_some());
        sim.step(1.0 / 30.0);
        assert_eq!(sim.engine().behavior_name("alpha"), Some("following_path"));
    }

    #[test]
    fn test_meeting_in_other_room_is_ignored() {
        let mut sim = simulation();
        feed(
            &mut sim,
            &[
                r#"{"type": "bot_joined", "session_key": "alpha", "x": 0.0, "z": 0.0}"#,
                r#"{"type": "meeting_started", "room_id": "lab", "seats": [{"session_key": "alpha", "x": 0.3, "z": 0.3}]}"#,
            ],
        );
        sim.step(1.0 / 30.0);
        assert_eq!(sim.engine().behavior_name("alpha"), Some("wandering"));

        feed(
            &mut sim,
            &[r#"{"type": "meeting_started", "room_id": "office", "seats": [{"session_key": "alpha", "x": 0.3, "z": 0.3}]}"#],
        );
        sim.step(1.0 / 30.0);
        assert_eq!(sim.engine().behavior_name("alpha"), Some("gathering"));
    }

    #[test]
    fn test_frame_serializes_as_one_line() {
        let mut sim = simulation();
        feed(&mut sim, &[r#"{"type": "bot_joined", "session_key": "alpha", "x": 0.0, "z": 0.0}"#]);
        sim.step(1.0 / 30.0);

        let mut out = Vec::new();
        write_frame(&mut out, &sim.frame()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["tick"], 1);
        assert_eq!(value["bots"][0]["sessionKey"], "alpha");
        assert_eq!(value["bots"][0]["state"], "wandering");
    }

    #[test]
    fn test_shutdown_clears_everything() {
        let mut sim = simulation();
        feed(
            &mut sim,
            &[
                r#"{"type": "bot_joined", "session_key": "a", "x": 0.0, "z": 0.0}"#,
                r#"{"type": "bot_joined", "session_key": "b", "x": 0.6, "z": 0.0}"#,
            ],
        );
        sim.step(1.0 / 30.0);
        sim.shutdown();
        assert!(sim.registry().is_empty());
        assert!(sim.engine().is_empty());
        assert_eq!(sim.manager().bot_count(), 0);
    }
}
