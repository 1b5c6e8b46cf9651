//! Utility re-exports and helper macros for the Gleichlauf controller.
//!
//! This module re-exports the control core, the run-session model, and the
//! fixed-point helpers, and provides a helper macro for static initialization:
//!
//! - `control`: proportional position controller and its result type
//! - `math`: fixed-point decimal scales and rounding helpers
//! - `session`: run model, operator commands, and the motor-pair seam
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod control;
pub mod math;
pub mod session;

pub use control::{ControlResult, ControllerConfig, PositionController};
pub use embassy_time::{Duration, Instant};
pub use session::{MotorPair, SessionCommand, SyncSession, SESSION_CHANNEL};

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
