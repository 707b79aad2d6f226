//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and projection helpers
//! - Fixed-timestep scheduling and timers
//! - Logging setup

pub mod math;
pub mod time;
pub mod logging;
