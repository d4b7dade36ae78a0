pub mod manager;
pub mod navigator;
pub mod proximity;
pub mod vision;
pub mod zones;

pub use manager::{AwarenessConfig, BotSpatialInfo, NearbyBot, SpatialManager};
pub use navigator::{NavigationPath, NavigatorConfig, PropPlacement, SpatialNavigator};
pub use proximity::{EntryType, ProximityConfig, ProximityEntry, ProximityGrid, ProximityHit, RadiusQuery};
pub use vision::{BlockReason, Visibility, VisibleProp, VisionConfig, VisionSystem};
pub use zones::{grid_to_zone, nearest_walkable_cell, zone_anchor, Zone};

use std::f64::consts::{PI, TAU};

/// Wrap an angle into `[-PI, PI]`
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    if (-PI..=PI).contains(&angle) {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid maps PI to -PI; keep the sign of the input at the seam
    if wrapped == -PI && angle > 0.0 {
        PI
    } else {
        wrapped
    }
}

/// Heading of the vector `(dx, dz)`; 0 faces +z
pub fn heading(dx: f64, dz: f64) -> f64 {
    dx.atan2(dz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle_wraps() {
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert_eq!(normalize_angle(PI), PI);
        assert_eq!(normalize_angle(0.25), 0.25);
        assert_eq!(normalize_angle(f64::NAN), 0.0);
    }

    #[test]
    fn test_heading_axes() {
        assert_eq!(heading(0.0, 1.0), 0.0);
        assert!((heading(1.0, 0.0) - PI / 2.0).abs() < 1e-12);
    }
}
