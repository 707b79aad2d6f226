//! Physics toggle
//!
//! There is no rigid-body simulation yet. The manager keeps the on/off switch
//! and the gravity constant so applications and key bindings have something
//! stable to talk to, and counts the steps it was asked to take.

use serde::{Deserialize, Serialize};

/// Standard gravity in m/s²
pub const EARTH_GRAVITY: f32 = 9.81;

/// Physics switch and step driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsManager {
    /// Whether [`PhysicsManager::step`] does anything
    pub active: bool,
    /// Downward acceleration
    pub gravity: f32,
    #[serde(skip)]
    steps: u64,
    #[serde(skip)]
    simulated_time: f64,
}

impl Default for PhysicsManager {
    fn default() -> Self {
        Self { active: true, gravity: EARTH_GRAVITY, steps: 0, simulated_time: 0.0 }
    }
}

impl PhysicsManager {
    /// Create an active manager with Earth gravity
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the active flag
    ///
    /// # Returns
    /// The new state
    pub fn toggle(&mut self) -> bool {
        self.active = !self.active;
        log::info!("Physics {}", if self.active { "enabled" } else { "disabled" });
        self.active
    }

    /// Advance by `delta_time` seconds
    pub fn step(&mut self, delta_time: f32) {
        if !self.active {
            log::trace!("Physics inactive, skipping step");
            return;
        }
        self.steps += 1;
        self.simulated_time += f64::from(delta_time.max(0.0));
    }

    /// Steps taken while active
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Total time stepped while active
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }
}
