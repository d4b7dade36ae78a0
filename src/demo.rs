use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::blueprint::{BlueprintError, BlueprintJson, GridPos, RoomBlueprint};
use crate::event::{AnimTargetSet, BotJoined, MeetingStarted, Navigate, SeatAssignment, SessionRef, SimEvent, Typing};
use crate::spatial::{nearest_walkable_cell, Zone};
use crate::state::MeetingSeat;

/// Room id the demo office is simulated as
pub const DEMO_ROOM_ID: &str = "office";

/// Bots spawned by the demo when no count is given
pub const DEFAULT_DEMO_BOTS: usize = 5;

const DEMO_OFFICE: &str = r#"{
    "id": "office",
    "name": "Office",
    "gridWidth": 16,
    "gridDepth": 12,
    "cellSize": 0.6,
    "walkableCenter": {"x": 10, "z": 6},
    "placements": [
        {"propId": "desk-with-monitor", "x": 2, "z": 2, "span": {"w": 2, "d": 1}},
        {"propId": "desk-with-dual-monitors", "x": 5, "z": 2, "span": {"w": 2, "d": 1}},
        {"propId": "desk-small", "x": 9, "z": 2, "span": {"w": 2, "d": 1}},
        {"propId": "work-point-1", "x": 2, "z": 3, "type": "interaction", "interactionType": "work"},
        {"propId": "work-point-2", "x": 5, "z": 3, "type": "interaction", "interactionType": "work"},
        {"propId": "work-point-3", "x": 9, "z": 3, "type": "interaction", "interactionType": "work"},
        {"propId": "bookshelf", "x": 13, "z": 1, "span": {"w": 2, "d": 1}},
        {"propId": "conference-table", "x": 6, "z": 6, "span": {"w": 3, "d": 2}},
        {"propId": "rug-large", "x": 5, "z": 9, "span": {"w": 3, "d": 1}},
        {"propId": "couch", "x": 11, "z": 9, "span": {"w": 2, "d": 1}},
        {"propId": "sleep-corner", "x": 11, "z": 8, "type": "interaction", "interactionType": "sleep"},
        {"propId": "coffee-machine", "x": 14, "z": 5},
        {"propId": "coffee-point", "x": 13, "z": 5, "type": "interaction", "interactionType": "coffee"},
        {"propId": "plant-large", "x": 1, "z": 10},
        {"propId": "plant", "x": 14, "z": 10}
    ],
    "doors": [{"x": 0, "z": 6, "facing": "west"}],
    "doorPositions": [{"x": 0, "z": 6}]
}"#;

/// The built-in demo office
pub fn demo_blueprint() -> Result<RoomBlueprint, BlueprintError> {
    BlueprintJson::from_json(DEMO_OFFICE)?.compile()
}

// ============================================================================
// BOT PERSONALITIES
// ============================================================================

/// How restless a demo bot is
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivityStyle {
    Fast,
    Steady,
    Bursty,
}

impl ActivityStyle {
    /// Pause between two actions, in milliseconds
    fn interval_range(&self) -> (u64, u64) {
        match self {
            ActivityStyle::Fast => (1500, 4000),
            ActivityStyle::Steady => (3000, 6000),
            ActivityStyle::Bursty => (800, 9000),
        }
    }
}

/// A demo bot and the places it likes
#[derive(Debug, Clone)]
pub struct BotPersonality {
    pub name: &'static str,
    pub activity_style: ActivityStyle,
    pub favorite_props: &'static [&'static str],
    /// Chance of heading to the couch when idle
    pub nap_tendency: f64,
}

static BOT_PERSONALITIES: [BotPersonality; 5] = [
    BotPersonality {
        name: "atlas",
        activity_style: ActivityStyle::Steady,
        favorite_props: &["desk-with-monitor", "bookshelf"],
        nap_tendency: 0.05,
    },
    BotPersonality {
        name: "nova",
        activity_style: ActivityStyle::Fast,
        favorite_props: &["desk-with-dual-monitors", "coffee-machine"],
        nap_tendency: 0.1,
    },
    BotPersonality {
        name: "sage",
        activity_style: ActivityStyle::Steady,
        favorite_props: &["bookshelf", "desk-small"],
        nap_tendency: 0.15,
    },
    BotPersonality {
        name: "bolt",
        activity_style: ActivityStyle::Bursty,
        favorite_props: &["coffee-machine", "plant-large"],
        nap_tendency: 0.2,
    },
    BotPersonality {
        name: "echo",
        activity_style: ActivityStyle::Fast,
        favorite_props: &["desk-small", "plant"],
        nap_tendency: 0.3,
    },
];

/// One demo bot: a personality and the session it runs under
#[derive(Debug, Clone)]
struct DemoBot {
    session_key: String,
    personality: &'static BotPersonality,
}

/// `count` bots cycling through the personalities. The first of each
/// personality is `agent:<name>:main`, repeats are `agent:<name>-<n>:main`.
fn demo_roster(count: usize) -> Vec<DemoBot> {
    (0..count)
        .map(|i| {
            let personality = &BOT_PERSONALITIES[i % BOT_PERSONALITIES.len()];
            let round = i / BOT_PERSONALITIES.len();
            let session_key = if round == 0 {
                format!("agent:{}:main", personality.name)
            } else {
                format!("agent:{}-{}:main", personality.name, round + 1)
            };
            DemoBot {
                session_key,
                personality,
            }
        })
        .collect()
}

fn pause(style: ActivityStyle, rng: &mut StdRng) -> Duration {
    let (min, max) = style.interval_range();
    Duration::from_millis(rng.gen_range(min..=max))
}

/// One random action for a bot
fn next_action(bot: &DemoBot, blueprint: &RoomBlueprint, rng: &mut StdRng) -> SimEvent {
    let personality = bot.personality;
    let key = bot.session_key.clone();
    let roll: f64 = rng.gen();

    if roll < personality.nap_tendency {
        if let Some(couch) = blueprint.find_prop("couch") {
            let at = blueprint.grid_to_world(couch);
            return SimEvent::AnimTarget(AnimTargetSet {
                session_key: key,
                x: at.x,
                z: at.z,
                freeze: true,
            });
        }
    }
    if roll < 0.35 {
        return SimEvent::Navigate(Navigate {
            session_key: key,
            prop_id: personality.favorite_props.choose(rng).map(|p| p.to_string()),
            zone: None,
            speed: None,
        });
    }
    if roll < 0.5 {
        return SimEvent::Navigate(Navigate {
            session_key: key,
            prop_id: None,
            zone: Zone::ALL.choose(rng).map(|z| z.to_string()),
            speed: None,
        });
    }
    if roll < 0.6 {
        return SimEvent::ClearAnimTarget(SessionRef { session_key: key });
    }
    SimEvent::Typing(Typing {
        session_key: key,
        typing: rng.gen_bool(0.5),
    })
}

/// Seats spread evenly around the conference table, facing it
fn meeting_seats(blueprint: &RoomBlueprint, keys: &[String]) -> Vec<SeatAssignment> {
    let table = blueprint
        .find_prop("conference-table")
        .map(|origin| blueprint.grid_to_world(origin.offset(1, 0)))
        .unwrap_or_else(|| blueprint.world_center());
    let radius = blueprint.cell_size * 2.2;
    keys.iter()
        .enumerate()
        .map(|(i, key)| {
            let angle = std::f64::consts::TAU * i as f64 / keys.len().max(1) as f64;
            SeatAssignment {
                session_key: key.clone(),
                seat: MeetingSeat {
                    x: table.x + angle.sin() * radius,
                    z: table.z + angle.cos() * radius,
                    angle: angle + std::f64::consts::PI,
                },
            }
        })
        .collect()
}

/// Join point just inside the door
fn spawn_cell(blueprint: &RoomBlueprint) -> GridPos {
    let door = blueprint.doors.first().copied().unwrap_or(GridPos::new(1, 1));
    nearest_walkable_cell(blueprint, door).unwrap_or(door)
}

/// Drive the demo office: `bots` bots trickle in, pick things to do, and
/// every so often get called into a meeting.
pub async fn generate_demo_events(tx: mpsc::Sender<SimEvent>, blueprint: Arc<RoomBlueprint>, seed: u64, bots: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let spawn = blueprint.grid_to_world(spawn_cell(&blueprint));
    let roster = demo_roster(bots);
    if roster.is_empty() {
        return;
    }

    for bot in &roster {
        let joined = SimEvent::BotJoined(BotJoined {
            session_key: bot.session_key.clone(),
            x: spawn.x,
            z: spawn.z,
            facing: std::f64::consts::FRAC_PI_2,
            home_room: Some(DEMO_ROOM_ID.to_string()),
        });
        if tx.send(joined).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(rng.gen_range(400..1200))).await;
    }

    let keys: Vec<String> = roster.iter().map(|bot| bot.session_key.clone()).collect();
    let mut meeting_active = false;
    let mut rounds: u32 = 0;

    loop {
        rounds += 1;
        // Roughly every dozen rounds the room gathers, a few rounds later it disperses
        if !meeting_active && rounds % 12 == 0 {
            let started = SimEvent::MeetingStarted(MeetingStarted {
                room_id: DEMO_ROOM_ID.to_string(),
                seats: meeting_seats(&blueprint, &keys),
            });
            if tx.send(started).await.is_err() {
                return;
            }
            meeting_active = true;
        } else if meeting_active && rounds % 12 == 4 {
            if tx.send(SimEvent::MeetingEnded).await.is_err() {
                return;
            }
            meeting_active = false;
        }

        if let Some(bot) = roster.choose(&mut rng) {
            let action = next_action(bot, &blueprint, &mut rng);
            debug!("Demo action for {}: {:?}", bot.session_key, action);
            if tx.send(action).await.is_err() {
                return;
            }
            tokio::time::sleep(pause(bot.personality.activity_style, &mut rng)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_demo_blueprint_compiles() {
        let bp = demo_blueprint().unwrap();
        assert_eq!(bp.name, "Office");
        assert!(bp.has_walkable_mask());
        assert!(bp.find_prop("couch").is_some());
        assert!(bp.is_walkable(spawn_cell(&bp)));
    }

    #[test]
    fn test_demo_blueprint_validates_cleanly() {
        let (errors, warnings) = BlueprintJson::from_json(DEMO_OFFICE).unwrap().validate();
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_personality_props_exist() {
        let bp = demo_blueprint().unwrap();
        for personality in BOT_PERSONALITIES.iter() {
            for prop in personality.favorite_props {
                assert!(bp.find_prop(prop).is_some(), "{} missing", prop);
            }
        }
    }

    #[test]
    fn test_actions_target_the_bot() {
        let bp = demo_blueprint().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let roster = demo_roster(8);
        for _ in 0..200 {
            let bot = &roster[rng.gen_range(0..roster.len())];
            let action = next_action(bot, &bp, &mut rng);
            assert_eq!(action.session_key(), Some(bot.session_key.as_str()));
        }
    }

    #[test]
    fn test_meeting_seats_are_distinct() {
        let bp = demo_blueprint().unwrap();
        let keys: Vec<String> = demo_roster(DEFAULT_DEMO_BOTS).into_iter().map(|bot| bot.session_key).collect();
        let seats = meeting_seats(&bp, &keys);
        assert_eq!(seats.len(), keys.len());
        for (i, a) in seats.iter().enumerate() {
            for b in &seats[i + 1..] {
                assert!((a.seat.x - b.seat.x).abs() + (a.seat.z - b.seat.z).abs() > 0.1);
            }
        }
    }

    #[test]
    fn test_roster_cycles_personalities_with_numbered_keys() {
        let roster = demo_roster(12);
        let keys: HashSet<&str> = roster.iter().map(|bot| bot.session_key.as_str()).collect();
        assert_eq!(keys.len(), 12);
        assert_eq!(roster[0].session_key, "agent:atlas:main");
        assert_eq!(roster[5].session_key, "agent:atlas-2:main");
        assert_eq!(roster[11].session_key, "agent:atlas-3:main");
        assert_eq!(roster[6].personality.name, "nova");
        assert!(demo_roster(0).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_joins_requested_bot_count() {
        let blueprint = Arc::new(demo_blueprint().unwrap());
        let (tx, mut rx) = mpsc::channel(64);
        let generator = tokio::spawn(generate_demo_events(tx, blueprint, 7, 9));

        let mut joined = HashSet::new();
        while joined.len() < 9 {
            match rx.recv().await {
                Some(SimEvent::BotJoined(bot)) => assert!(joined.insert(bot.session_key)),
                Some(other) => panic!("action before every bot joined: {:?}", other),
                None => panic!("generator stopped early"),
            }
        }
        assert!(joined.contains("agent:echo:main"));
        assert!(joined.contains("agent:sage-2:main"));

        // The next event is an action for one of the joined bots
        let next = rx.recv().await.unwrap();
        assert!(joined.contains(next.session_key().unwrap()));
        generator.abort();
    }

    #[tokio::test]
    async fn test_generator_without_bots_finishes() {
        let blueprint = Arc::new(demo_blueprint().unwrap());
        let (tx, mut rx) = mpsc::channel(8);
        generate_demo_events(tx, blueprint, 7, 0).await;
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_activity_style_intervals() {
        for style in [ActivityStyle::Fast, ActivityStyle::Steady, ActivityStyle::Bursty] {
            let (min, max) = style.interval_range();
            assert!(min < max);
        }
    }
}
