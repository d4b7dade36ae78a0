use std::collections::HashMap;

use log::info;
use serde::{Deserialize, Serialize};

/// Seat a bot walks to when a meeting is called
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeetingSeat {
    /// World position
    pub x: f64,
    pub z: f64,
    /// Facing once seated (radians)
    #[serde(default)]
    pub angle: f64,
}

/// Read-only view of meeting state consumed by the movement engine
pub trait MeetingCoordinator {
    fn is_meeting_active(&self) -> bool;

    /// Seat assigned to a bot for the current meeting
    fn seat_for(&self, session_key: &str) -> Option<MeetingSeat>;

    /// Room a bot belongs to when it is not visiting
    fn home_room(&self, session_key: &str) -> Option<&str>;
}

/// In-memory meeting state driven by input events
#[derive(Debug, Default)]
pub struct MeetingBoard {
    room_id: Option<String>,
    seats: HashMap<String, MeetingSeat>,
    home_rooms: HashMap<String, String>,
}

impl MeetingBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a meeting, replacing any seating from a previous one
    pub fn start(&mut self, room_id: &str, seats: impl IntoIterator<Item = (String, MeetingSeat)>) {
        self.seats = seats.into_iter().collect();
        self.room_id = Some(room_id.to_string());
        info!("Meeting started in '{}' with {} seats", room_id, self.seats.len());
    }

    pub fn end(&mut self) {
        if let Some(room) = self.room_id.take() {
            info!("Meeting in '{}' ended", room);
        }
        self.seats.clear();
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn set_home_room(&mut self, session_key: &str, room_id: &str) {
        self.home_rooms.insert(session_key.to_string(), room_id.to_string());
    }

    /// Forget everything about a bot that left
    pub fn forget(&mut self, session_key: &str) {
        self.seats.remove(session_key);
        self.home_rooms.remove(session_key);
    }
}

impl MeetingCoordinator for MeetingBoard {
    fn is_meeting_active(&self) -> bool {
        self.room_id.is_some()
    }

    fn seat_for(&self, session_key: &str) -> Option<MeetingSeat> {
        self.seats.get(session_key).copied()
    }

    fn home_room(&self, session_key: &str) -> Option<&str> {
        self.home_rooms.get(session_key).map(String::as_str)
    }
}
