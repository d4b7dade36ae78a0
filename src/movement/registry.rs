use std::collections::HashMap;

use serde::Serialize;

/// Rendered pose of one bot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BotPosition {
    pub x: f64,
    /// Vertical offset from the bounce animation
    pub y: f64,
    pub z: f64,
    pub facing: f64,
}

/// World positions of every bot, shared across rooms.
///
/// Created by the simulation root and passed into each frame. During a tick
/// every bot writes its own entry and reads the others, so bots processed
/// later in the frame see neighbours that already moved this frame.
#[derive(Debug, Default)]
pub struct PositionRegistry {
    positions: HashMap<String, BotPosition>,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, session_key: &str, position: BotPosition) {
        match self.positions.get_mut(session_key) {
            Some(existing) => *existing = position,
            None => {
                self.positions.insert(session_key.to_string(), position);
            }
        }
    }

    pub fn get(&self, session_key: &str) -> Option<&BotPosition> {
        self.positions.get(session_key)
    }

    pub fn remove(&mut self, session_key: &str) -> Option<BotPosition> {
        self.positions.remove(session_key)
    }

    pub fn contains(&self, session_key: &str) -> bool {
        self.positions.contains_key(session_key)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BotPosition)> {
        self.positions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}
