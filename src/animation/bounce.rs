use std::f64::consts::PI;

/// Peak gait bob while wandering (world units)
const WANDER_BOB: f64 = 0.04;

/// Peak gait bob while walking somewhere on purpose
const ACTIVE_BOB: f64 = 0.06;

/// Vertical offset of a bot for this frame.
///
/// Walking bots bob twice per stride (`phase` is the stride angle); idle
/// bots breathe; typing bots tap out a small fast jitter. Cosmetic only,
/// never fed back into grid logic.
pub fn bounce_offset(
    phase: f64,
    is_moving: bool,
    is_active_walking: bool,
    typing_pause: bool,
    elapsed: f64,
) -> f64 {
    if is_moving {
        let amplitude = if is_active_walking { ACTIVE_BOB } else { WANDER_BOB };
        return phase.sin().abs() * amplitude;
    }
    if typing_pause {
        return (elapsed * 14.0).sin().abs() * 0.008;
    }
    breathing(elapsed, 0.4) * 0.012
}

/// Slow idle breathing in `0..=1`
pub fn breathing(time: f64, speed: f64) -> f64 {
    let t = time * speed;
    // Second harmonic keeps it from looking like a metronome
    let base = (t * PI).sin();
    let harmonic = (t * PI * 2.0).sin() * 0.2;
    ((base + harmonic + 1.2) / 2.4).clamp(0.0, 1.0)
}

/// Advance a stride phase while moving, let it settle toward 0 when idle
pub fn advance_walk_phase(phase: f64, is_moving: bool, dt: f64, rate: f64, decay: f64) -> f64 {
    if is_moving {
        return (phase + dt * rate) % (2.0 * PI);
    }
    let settled = phase * (1.0 - decay * dt).max(0.0);
    if settled.abs() < 1e-4 {
        0.0
    } else {
        settled
    }
}
