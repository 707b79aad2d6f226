//! Time management utilities
//!
//! The render loop is gated by [`FixedTimestep`]: every outer loop iteration
//! calls `tick`, and the update pass runs at most once per call on a fixed
//! `1/60 s` grid. Times are plain `f64` seconds so tests can drive the clock
//! explicitly.

use std::collections::HashMap;
use std::time::Instant;

/// Default update interval (60 Hz)
pub const DEFAULT_UPDATE_INTERVAL: f64 = 1.0 / 60.0;

/// Samples this close to a scheduled update count as on time
const SCHEDULE_TOLERANCE: f64 = 1e-9;

/// Source of monotonic time in seconds
pub trait Clock {
    /// Seconds elapsed since an arbitrary fixed origin
    fn now(&self) -> f64;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Fixed-interval update scheduler
///
/// Scheduled times are `origin + steps × interval` rather than a running
/// sum, so a clock sampled on the grid never drifts behind it. When real
/// time overruns the schedule the origin is snapped to the current time
/// instead of replaying every missed step.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    interval: f64,
    origin: Option<f64>,
    steps: u64,
    delta_time: f32,
    updates: u64,
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL)
    }
}

impl FixedTimestep {
    /// Create a scheduler stepping every `interval` seconds
    pub fn new(interval: f64) -> Self {
        Self {
            interval: if interval > 0.0 { interval } else { DEFAULT_UPDATE_INTERVAL },
            origin: None,
            steps: 0,
            delta_time: 0.0,
            updates: 0,
        }
    }

    /// Sample `clock` and advance the schedule
    pub fn tick(&mut self, clock: &dyn Clock) -> bool {
        self.tick_at(clock.now())
    }

    /// Advance the schedule for a caller-supplied time sample
    ///
    /// # Returns
    /// `true` when the update pass is due this iteration
    pub fn tick_at(&mut self, now: f64) -> bool {
        let origin = *self.origin.get_or_insert(now);
        let due = now + SCHEDULE_TOLERANCE >= self.scheduled(origin);

        if due {
            self.steps += 1;
            let next = self.scheduled(origin);
            if now > next + SCHEDULE_TOLERANCE {
                log::trace!("Timestep overrun by {:.4}s, snapping schedule", now - next);
                self.origin = Some(now);
                self.steps = 0;
            }
            self.updates += 1;
        }

        self.delta_time = self.next_update().map_or(0.0, |next| (next - now) as f32);
        due
    }

    fn scheduled(&self, origin: f64) -> f64 {
        origin + self.steps as f64 * self.interval
    }

    /// Remaining slack before the next scheduled update (seconds)
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Scheduled time of the next update, if the clock has started
    pub fn next_update(&self) -> Option<f64> {
        self.origin.map(|origin| self.scheduled(origin))
    }

    /// Fixed update interval
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Number of update passes fired so far
    pub fn update_count(&self) -> u64 {
        self.updates
    }
}

/// Frames-per-second sampler publishing once per whole second
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    window_start: Option<f64>,
    frames: u32,
    fps: f32,
}

impl FrameCounter {
    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame at time `now`
    ///
    /// # Returns
    /// The freshly published sample when a second boundary was crossed
    pub fn record_frame(&mut self, now: f64) -> Option<f32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        let elapsed = now - start;
        if elapsed >= 1.0 {
            self.fps = (f64::from(self.frames) / elapsed) as f32;
            self.frames = 0;
            self.window_start = Some(now);
            return Some(self.fps);
        }
        None
    }

    /// Most recent published sample
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// Countdown timer measured against caller-supplied time samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    start: Option<f64>,
    lifetime: f64,
}

impl Timer {
    /// Create a stopped timer lasting `lifetime` seconds
    pub fn new(lifetime: f64) -> Self {
        Self { start: None, lifetime }
    }

    /// Start (or restart) the timer at `now`
    pub fn start(&mut self, now: f64) {
        self.start = Some(now);
    }

    /// Seconds since the timer was started; zero while stopped
    pub fn elapsed(&self, now: f64) -> f64 {
        self.start.map_or(0.0, |start| (now - start).max(0.0))
    }

    /// True once a started timer has run for its whole lifetime
    pub fn is_done(&self, now: f64) -> bool {
        self.start.is_some() && self.elapsed(now) >= self.lifetime
    }
}

/// Named collection of [`Timer`]s
#[derive(Debug, Default)]
pub struct TimerSet {
    timers: HashMap<String, Timer>,
}

impl TimerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and start a timer, replacing any with the same name
    pub fn start(&mut self, name: impl Into<String>, lifetime: f64, now: f64) {
        let mut timer = Timer::new(lifetime);
        timer.start(now);
        self.timers.insert(name.into(), timer);
    }

    /// Look up a timer by name
    pub fn get(&self, name: &str) -> Option<&Timer> {
        self.timers.get(name)
    }

    /// True if the named timer exists and has finished
    pub fn is_done(&self, name: &str, now: f64) -> bool {
        self.timers.get(name).is_some_and(|t| t.is_done(now))
    }

    /// Drop every finished timer, returning their names
    pub fn drain_finished(&mut self, now: f64) -> Vec<String> {
        let finished: Vec<String> = self
            .timers
            .iter()
            .filter(|(_, t)| t.is_done(now))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &finished {
            self.timers.remove(name);
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: f64 = 1.0 / 60.0;

    #[test]
    fn test_first_tick_fires_immediately() {
        let mut step = FixedTimestep::default();
        assert!(step.tick_at(10.0));
        assert!((step.next_update().unwrap() - (10.0 + STEP)).abs() < 1e-12);
        assert!((f64::from(step.delta_time()) - STEP).abs() < 1e-6);
    }

    #[test]
    fn test_does_not_fire_before_schedule() {
        let mut step = FixedTimestep::default();
        step.tick_at(0.0);
        assert!(!step.tick_at(STEP * 0.5));
        assert_eq!(step.update_count(), 1);
        assert!(step.tick_at(STEP));
        assert_eq!(step.update_count(), 2);
    }

    #[test]
    fn test_schedule_is_monotonic_and_fires_once_per_tick() {
        let samples = [0.0, 0.001, 0.02, 0.02, 0.5, 0.51, 0.515, 0.9, 0.95, 3.0, 3.001];
        let mut step = FixedTimestep::default();
        let mut previous = f64::MIN;

        for &now in &samples {
            let before = step.update_count();
            step.tick_at(now);
            assert!(step.update_count() - before <= 1);

            let next = step.next_update().unwrap();
            assert!(next >= previous);
            previous = next;
        }
    }

    #[test]
    fn test_grid_samples_fire_every_time() {
        let mut step = FixedTimestep::default();
        let fired = (0..90).filter(|&i| step.tick_at(f64::from(i) / 60.0)).count();
        assert_eq!(fired, 90);
        assert!((f64::from(step.delta_time()) - STEP).abs() < 1e-6);
    }

    #[test]
    fn test_stall_snaps_forward() {
        let mut step = FixedTimestep::default();
        step.tick_at(0.0);
        assert!(step.tick_at(100.0));
        assert_eq!(step.update_count(), 2);
        assert!((step.next_update().unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(step.delta_time(), 0.0);

        // The schedule resumes from the snap point instead of replaying missed steps.
        assert!(step.tick_at(100.0));
        assert!(!step.tick_at(100.0 + STEP * 0.5));
        assert_eq!(step.update_count(), 3);
    }

    #[test]
    fn test_frame_counter_publishes_each_second() {
        let mut counter = FrameCounter::new();
        let mut published = None;
        for i in 0..=60 {
            if let Some(fps) = counter.record_frame(f64::from(i) / 60.0) {
                published = Some(fps);
            }
        }
        let fps = published.expect("a sample after one second");
        assert!((fps - 61.0).abs() < 0.5);
    }

    #[test]
    fn test_timer_set() {
        let mut timers = TimerSet::new();
        timers.start("spawn", 2.0, 1.0);
        assert!(!timers.is_done("spawn", 2.5));
        assert!(timers.is_done("spawn", 3.0));
        assert_eq!(timers.drain_finished(3.0), vec!["spawn".to_string()]);
        assert!(timers.get("spawn").is_none());
    }
}
