//! Frame timing.

use std::time::Instant;

/// Longest time step handed to animation/physics, in seconds.
///
/// A stalled frame (window drag, debugger pause) otherwise produces a huge
/// delta that blows up time-dependent updates.
pub const MAX_FRAME_TIME: f32 = 1.0 / 30.0;

/// Tracks elapsed wall-clock time between frames.
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    /// Start the clock at the current instant.
    pub fn start() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous tick, capped to [`MAX_FRAME_TIME`].
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt.min(MAX_FRAME_TIME)
    }

    /// Cap a raw delta to the maximum step.
    pub fn cap(dt: f32) -> f32 {
        dt.min(MAX_FRAME_TIME)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_limits_long_steps() {
        assert_eq!(FrameClock::cap(10.0), MAX_FRAME_TIME);
        assert_eq!(FrameClock::cap(0.016), 0.016);
        assert_eq!(FrameClock::cap(0.0), 0.0);
    }

    #[test]
    fn tick_is_non_negative_and_capped() {
        let mut clock = FrameClock::start();
        let dt = clock.tick();
        assert!(dt >= 0.0);
        assert!(dt <= MAX_FRAME_TIME);
    }
}
