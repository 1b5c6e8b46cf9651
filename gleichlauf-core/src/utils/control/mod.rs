//! Module Exports
//!
//! This file exports the control core of the synchronization rig.
//!
//! - `position`: proportional position controller for two encoder-driven motors
//!   and the per-step `ControlResult`.

/// Module for the proportional position controller.
pub mod position;

pub use position::{ControlResult, ControllerConfig, PositionController};
