use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Scripted destination (coffee machine, couch, ...)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimTarget {
    /// World position
    pub x: f64,
    pub z: f64,
    /// Snap onto the target and stop once there
    #[serde(default)]
    pub freeze_when_arrived: bool,
}

/// Per-session activity flags consumed by the movement engine
pub trait SessionActivity {
    fn is_typing(&self, session_key: &str) -> bool;

    fn anim_target(&self, session_key: &str) -> Option<AnimTarget>;
}

/// In-memory session activity driven by input events
#[derive(Debug, Default)]
pub struct ActivityBoard {
    typing: HashSet<String>,
    targets: HashMap<String, AnimTarget>,
}

impl ActivityBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_typing(&mut self, session_key: &str, typing: bool) {
        if typing {
            self.typing.insert(session_key.to_string());
        } else {
            self.typing.remove(session_key);
        }
    }

    pub fn set_anim_target(&mut self, session_key: &str, target: AnimTarget) {
        self.targets.insert(session_key.to_string(), target);
    }

    pub fn clear_anim_target(&mut self, session_key: &str) -> bool {
        self.targets.remove(session_key).is_some()
    }

    pub fn forget(&mut self, session_key: &str) {
        self.typing.remove(session_key);
        self.targets.remove(session_key);
    }
}

impl SessionActivity for ActivityBoard {
    fn is_typing(&self, session_key: &str) -> bool {
        self.typing.contains(session_key)
    }

    fn anim_target(&self, session_key: &str) -> Option<AnimTarget> {
        self.targets.get(session_key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_flag() {
        let mut board = ActivityBoard::new();
        board.set_typing("alpha", true);
        assert!(board.is_typing("alpha"));
        board.set_typing("alpha", false);
        assert!(!board.is_typing("alpha"));
    }

    #[test]
    fn test_anim_targets() {
        let mut board = ActivityBoard::new();
        let target = AnimTarget {
            x: 1.0,
            z: 2.0,
            freeze_when_arrived: true,
        };
        board.set_anim_target("alpha", target);
        assert_eq!(board.anim_target("alpha"), Some(target));
        assert!(board.clear_anim_target("alpha"));
        assert!(!board.clear_anim_target("alpha"));

        board.set_anim_target("beta", target);
        board.set_typing("beta", true);
        board.forget("beta");
        assert_eq!(board.anim_target("beta"), None);
        assert!(!board.is_typing("beta"));
    }
}
