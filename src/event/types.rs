use serde::{Deserialize, Serialize};

use crate::state::{AnimTarget, MeetingSeat};

/// Identifies a bot session
pub type SessionKey = String;

/// A bot entered the focused room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotJoined {
    pub session_key: SessionKey,
    /// Spawn position (world units)
    pub x: f64,
    pub z: f64,
    #[serde(default)]
    pub facing: f64,
    /// Room the bot belongs to, when it is only visiting this one
    #[serde(default)]
    pub home_room: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRef {
    pub session_key: SessionKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Typing {
    pub session_key: SessionKey,
    pub typing: bool,
}

/// Scripted destination for one bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimTargetSet {
    pub session_key: SessionKey,
    pub x: f64,
    pub z: f64,
    #[serde(default)]
    pub freeze: bool,
}

impl AnimTargetSet {
    pub fn target(&self) -> AnimTarget {
        AnimTarget {
            x: self.x,
            z: self.z,
            freeze_when_arrived: self.freeze,
        }
    }
}

/// One seat assignment in a meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub session_key: SessionKey,
    #[serde(flatten)]
    pub seat: MeetingSeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingStarted {
    pub room_id: String,
    pub seats: Vec<SeatAssignment>,
}

/// Ask the navigator for a path to a prop or a zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Navigate {
    pub session_key: SessionKey,
    #[serde(default)]
    pub prop_id: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
}

/// All input events, one JSON object per line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    BotJoined(BotJoined),
    BotLeft(SessionRef),
    Typing(Typing),
    AnimTarget(AnimTargetSet),
    ClearAnimTarget(SessionRef),
    MeetingStarted(MeetingStarted),
    MeetingEnded,
    Navigate(Navigate),
}

impl SimEvent {
    /// Bot the event is about, if it targets a single bot
    pub fn session_key(&self) -> Option<&str> {
        match self {
            SimEvent::BotJoined(e) => Some(&e.session_key),
            SimEvent::BotLeft(e) | SimEvent::ClearAnimTarget(e) => Some(&e.session_key),
            SimEvent::Typing(e) => Some(&e.session_key),
            SimEvent::AnimTarget(e) => Some(&e.session_key),
            SimEvent::Navigate(e) => Some(&e.session_key),
            SimEvent::MeetingStarted(_) | SimEvent::MeetingEnded => None,
        }
    }
}
