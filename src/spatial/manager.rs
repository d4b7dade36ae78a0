use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::blueprint::{GridPos, RoomBlueprint};
use crate::config::SimConfig;

use super::navigator::{NavigationPath, PropPlacement, SpatialNavigator};
use super::proximity::{EntryType, ProximityEntry, ProximityGrid, ProximityHit, RadiusQuery};
use super::vision::{Visibility, VisionSystem};
use super::zones::{grid_to_zone, Zone};

/// Awareness refresh cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwarenessConfig {
    /// Time between refreshes of one bot
    pub interval_ms: u64,
    /// Radius (cells) of the nearby-bot query
    pub nearby_radius: f64,
}

impl Default for AwarenessConfig {
    fn default() -> Self {
        Self {
            interval_ms: 400,
            nearby_radius: 5.0,
        }
    }
}

impl AwarenessConfig {
    fn interval_secs(&self) -> f64 {
        (self.interval_ms.max(1)) as f64 / 1000.0
    }
}

/// Another bot within awareness radius
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyBot {
    pub session_key: String,
    pub distance: f64,
}

/// Spatial snapshot of one bot, as seen by behavior and inspection callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSpatialInfo {
    pub session_key: String,
    pub grid_x: i32,
    pub grid_z: i32,
    pub zone: Zone,
    pub facing_angle: f64,
    pub visible_props: Vec<String>,
    pub nearby_bots: Vec<NearbyBot>,
    pub active_path: Option<NavigationPath>,
}

impl BotSpatialInfo {
    pub fn grid_pos(&self) -> GridPos {
        GridPos::new(self.grid_x, self.grid_z)
    }
}

/// Staggered refresh bookkeeping for one bot
#[derive(Debug, Clone, Copy)]
struct AwarenessSlot {
    /// Fraction of the interval this bot is offset by
    phase: f64,
    next_due: Option<f64>,
}

/// Per-room orchestrator over vision, proximity and navigation.
///
/// Every query keyed by session returns `None` or an empty result for
/// unknown keys; callers are never assumed to keep their bot lists in
/// sync with the manager.
#[derive(Debug)]
pub struct SpatialManager {
    blueprint: Arc<RoomBlueprint>,
    vision: VisionSystem,
    proximity: ProximityGrid,
    navigator: SpatialNavigator,
    bots: HashMap<String, BotSpatialInfo>,
    awareness: AwarenessConfig,
    slots: HashMap<String, AwarenessSlot>,
    /// Registrations so far, used to spread refresh phases
    registrations: u64,
}

impl SpatialManager {
    /// Focus a room: build the subsystems and index its props and doors
    pub fn new(blueprint: Arc<RoomBlueprint>, config: &SimConfig) -> Self {
        let mut proximity = ProximityGrid::with_bucket_size(config.proximity.bucket_size);

        for (pos, cell) in blueprint.iter_cells() {
            if !cell.is_prop_origin() {
                continue;
            }
            let Some(prop_id) = &cell.prop_id else {
                continue;
            };
            // Catalogue ids repeat (several desks), so the entry id carries the cell
            let entry = ProximityEntry::new(
                format!("prop:{}:{},{}", prop_id, pos.x, pos.z),
                pos.x as f64,
                pos.z as f64,
                EntryType::Prop,
            )
            .with_meta(json!({
                "propId": prop_id,
                "interactionType": cell.interaction_type,
            }));
            proximity.insert(entry);
        }

        for (i, door) in blueprint.doors.iter().enumerate() {
            let entry = ProximityEntry::new(format!("door-{}", i), door.x as f64, door.z as f64, EntryType::Door)
                .with_meta(json!({ "x": door.x, "z": door.z }));
            proximity.insert(entry);
        }

        info!(
            "Focused room '{}' ({}x{}, {} props, {} doors)",
            blueprint.name,
            blueprint.grid_width,
            blueprint.grid_depth,
            proximity.count_of(EntryType::Prop),
            proximity.count_of(EntryType::Door)
        );

        Self {
            vision: VisionSystem::new(Arc::clone(&blueprint), config.vision.clone()),
            navigator: SpatialNavigator::new(Arc::clone(&blueprint), config.navigator.clone()),
            blueprint,
            proximity,
            bots: HashMap::new(),
            awareness: config.awareness.clone(),
            slots: HashMap::new(),
            registrations: 0,
        }
    }

    pub fn blueprint(&self) -> &Arc<RoomBlueprint> {
        &self.blueprint
    }

    pub fn vision(&self) -> &VisionSystem {
        &self.vision
    }

    pub fn navigator(&self) -> &SpatialNavigator {
        &self.navigator
    }

    pub fn proximity(&self) -> &ProximityGrid {
        &self.proximity
    }

    fn zone_of(&self, pos: GridPos) -> Zone {
        grid_to_zone(
            pos,
            self.blueprint.grid_width,
            self.blueprint.grid_depth,
            &self.blueprint.doors,
        )
    }

    /// Register a bot; re-adding a known key just moves it
    pub fn add_bot(&mut self, session_key: &str, grid_x: i32, grid_z: i32, facing_angle: f64) {
        if self.bots.contains_key(session_key) {
            self.update_bot_position(session_key, grid_x, grid_z, facing_angle);
            return;
        }

        let pos = GridPos::new(grid_x, grid_z);
        let info = BotSpatialInfo {
            session_key: session_key.to_string(),
            grid_x,
            grid_z,
            zone: self.zone_of(pos),
            facing_angle,
            visible_props: Vec::new(),
            nearby_bots: Vec::new(),
            active_path: None,
        };
        self.bots.insert(session_key.to_string(), info);
        self.proximity.insert(ProximityEntry::new(
            session_key,
            grid_x as f64,
            grid_z as f64,
            EntryType::Bot,
        ));

        // Golden-ratio spacing keeps phases spread for any bot count
        let phase = (self.registrations as f64 * 0.618_033_988_75).fract();
        self.registrations += 1;
        self.slots.insert(
            session_key.to_string(),
            AwarenessSlot {
                phase,
                next_due: None,
            },
        );
        debug!("Bot '{}' added at ({}, {})", session_key, grid_x, grid_z);
    }

    /// Unregister a bot; returns false if it was unknown
    pub fn remove_bot(&mut self, session_key: &str) -> bool {
        self.slots.remove(session_key);
        self.proximity.remove(session_key);
        self.bots.remove(session_key).is_some()
    }

    /// Record a bot's new cell and heading
    pub fn update_bot_position(
        &mut self,
        session_key: &str,
        grid_x: i32,
        grid_z: i32,
        facing_angle: f64,
    ) -> bool {
        let zone = self.zone_of(GridPos::new(grid_x, grid_z));
        let Some(info) = self.bots.get_mut(session_key) else {
            return false;
        };
        info.grid_x = grid_x;
        info.grid_z = grid_z;
        info.zone = zone;
        info.facing_angle = facing_angle;
        self.proximity.update(session_key, grid_x as f64, grid_z as f64);
        true
    }

    /// Update only the heading, without touching the index
    pub fn set_facing(&mut self, session_key: &str, facing_angle: f64) {
        if let Some(info) = self.bots.get_mut(session_key) {
            info.facing_angle = facing_angle;
        }
    }

    pub fn bot(&self, session_key: &str) -> Option<&BotSpatialInfo> {
        self.bots.get(session_key)
    }

    pub fn bots(&self) -> impl Iterator<Item = &BotSpatialInfo> {
        self.bots.values()
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    /// Recompute visible props and nearby bots for one bot
    pub fn refresh_bot_awareness(&mut self, session_key: &str) -> Option<BotSpatialInfo> {
        let (pos, facing) = {
            let info = self.bots.get(session_key)?;
            (info.grid_pos(), info.facing_angle)
        };

        let visible_props = self
            .vision
            .get_visible_props(pos, facing)
            .into_iter()
            .map(|p| p.prop_id)
            .collect();

        let query = RadiusQuery::new(pos.x as f64, pos.z as f64, self.awareness.nearby_radius)
            .of_type(EntryType::Bot)
            .excluding(session_key);
        let mut nearby_bots: Vec<NearbyBot> = self
            .proximity
            .query_radius(&query)
            .into_iter()
            .map(|hit| NearbyBot {
                session_key: hit.id,
                distance: hit.distance,
            })
            .collect();
        nearby_bots.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.session_key.cmp(&b.session_key))
        });

        let info = self.bots.get_mut(session_key)?;
        info.visible_props = visible_props;
        info.nearby_bots = nearby_bots;
        Some(info.clone())
    }

    /// Refresh every bot whose staggered deadline has passed.
    ///
    /// `now` is seconds on any monotonic clock. Returns how many bots
    /// were refreshed.
    pub fn refresh_due_awareness(&mut self, now: f64) -> usize {
        let interval = self.awareness.interval_secs();
        let mut due: Vec<String> = Vec::new();

        for (key, slot) in self.slots.iter_mut() {
            let next_due = *slot.next_due.get_or_insert(now + slot.phase * interval);
            if now >= next_due {
                let mut following = next_due + interval;
                if following <= now {
                    following = now + interval;
                }
                slot.next_due = Some(following);
                due.push(key.clone());
            }
        }

        due.sort();
        for key in &due {
            self.refresh_bot_awareness(key);
        }
        due.len()
    }

    /// Line of sight between two registered bots, using the observer's heading
    pub fn can_bot_see(&self, observer_key: &str, target_key: &str) -> Option<Visibility> {
        let observer = self.bots.get(observer_key)?;
        let target = self.bots.get(target_key)?;
        Some(
            self.vision
                .can_see(observer.grid_pos(), target.grid_pos(), observer.facing_angle),
        )
    }

    pub fn get_visible_cells(&self, session_key: &str) -> Vec<GridPos> {
        match self.bots.get(session_key) {
            Some(info) => self.vision.get_visible_cells(info.grid_pos(), info.facing_angle),
            None => Vec::new(),
        }
    }

    /// Path a bot to a prop; the path is kept as the bot's active path
    pub fn navigate_to(
        &mut self,
        session_key: &str,
        prop_id: &str,
        speed: Option<f64>,
    ) -> Option<NavigationPath> {
        let from = self.bots.get(session_key)?.grid_pos();
        let path = self.navigator.navigate_to_prop(from, prop_id, speed)?;
        self.set_active_path(session_key, path)
    }

    /// Path a bot to a named zone; the path is kept as the bot's active path
    pub fn navigate_to_zone(
        &mut self,
        session_key: &str,
        zone_name: &str,
        speed: Option<f64>,
    ) -> Option<NavigationPath> {
        let from = self.bots.get(session_key)?.grid_pos();
        let path = self.navigator.navigate_to_zone(from, zone_name, speed)?;
        self.set_active_path(session_key, path)
    }

    fn set_active_path(&mut self, session_key: &str, path: NavigationPath) -> Option<NavigationPath> {
        let info = self.bots.get_mut(session_key)?;
        info.active_path = Some(path.clone());
        Some(path)
    }

    pub fn active_path(&self, session_key: &str) -> Option<&NavigationPath> {
        self.bots.get(session_key)?.active_path.as_ref()
    }

    pub fn clear_active_path(&mut self, session_key: &str) {
        if let Some(info) = self.bots.get_mut(session_key) {
            info.active_path = None;
        }
    }

    /// Bots within `radius` cells of a registered bot, unordered
    pub fn nearby_bot_candidates(&self, session_key: &str, radius: f64) -> Vec<ProximityHit> {
        let Some(info) = self.bots.get(session_key) else {
            return Vec::new();
        };
        let query = RadiusQuery::new(info.grid_x as f64, info.grid_z as f64, radius)
            .of_type(EntryType::Bot)
            .excluding(session_key);
        self.proximity.query_radius(&query)
    }

    pub fn layout_summary(&self) -> String {
        self.navigator.get_layout_summary(&self.blueprint.name)
    }

    pub fn prop_layout(&self) -> Vec<PropPlacement> {
        self.navigator.get_prop_layout()
    }

    /// Drop every bot (room unfocus)
    pub fn clear_bots(&mut self) {
        for key in self.bots.keys() {
            self.proximity.remove(key);
        }
        self.bots.clear();
        self.slots.clear();
    }
}
