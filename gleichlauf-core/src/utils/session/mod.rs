//! Run-session model for the synchronization rig.
//!
//! Wraps a shared [`PositionController`](crate::utils::control::PositionController)
//! in the operator's run model: start/stop/reset/end, commanded setpoints with
//! an optional simultaneous mode, and a master switch for the control loop.
//! Operator commands arrive as JSON and are queued on `SESSION_CHANNEL`.

pub mod model;
pub mod rig;

use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use model::{CycleReport, RunStatus, SyncSession};
pub use rig::MotorPair;

/// Channel used to receive operator commands (`SessionCommand` messages).
pub static SESSION_CHANNEL: embassy_sync::channel::Channel<
    CriticalSectionRawMutex,
    SessionCommand,
    16,
> = embassy_sync::channel::Channel::new();

/// Selects one of the two synchronized motors.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Motor {
    A,
    B,
}

/// Operator command variants.
///
/// Serialized as JSON with tag `"sc"`; decimals are best sent as strings
/// (`{"sc":"set_gain","g":"2.5"}`) to keep them exact.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "sc", rename_all = "snake_case")] // sc = session command
pub enum SessionCommand {
    /// Begin cycling (from `Init` or `Stop`).
    Start,
    /// Pause cycling (from `Start`).
    Stop,
    /// Clear counter, timing, setpoints and encoders (from `Init` or `Stop`).
    Reset,
    /// Terminate the session.
    End,
    /// Set the proportional gain; `null` or missing means zero.
    SetGain { g: Option<Decimal> },
    /// Set a motor's commanded setpoint.
    SetSetpoint { m: Motor, v: Decimal },
    /// Mirror setpoint writes onto the other motor.
    SetSimultaneous { on: bool },
    /// Master switch for the control loop.
    SetControl { on: bool },
    /// Apply the correction to the given motor.
    SetMotorControl { m: Motor, on: bool },
}

impl SessionCommand {
    /// Parse a single JSON-encoded command.
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(input)?)
    }
}

/// Errors raised while handling operator commands.
#[derive(Debug)]
pub enum SessionError {
    /// The command is not allowed in the current run status.
    InvalidTransition {
        from: RunStatus,
        command: SessionCommand,
    },
    /// The session has ended and accepts no further commands.
    Ended,
    /// The command text is not valid JSON for `SessionCommand`.
    Parse(serde_json::Error),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Parse(err)
    }
}

impl fmt::Display for SessionError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            SessionError::InvalidTransition { from, command } => {
                write!(f, "{:?} not allowed while {:?}", command, from)
            }
            SessionError::Ended => f.write_str("session has ended"),
            SessionError::Parse(err) => write!(f, "invalid command: {}", err),
        }
    }
}
