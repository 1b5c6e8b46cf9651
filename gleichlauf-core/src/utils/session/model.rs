//! Session state: run status, commanded setpoints, and the per-cycle driver.

use core::fmt;

use embassy_time::Instant;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Motor, MotorPair, SessionCommand, SessionError};
use crate::utils::{
    control::{ControlResult, PositionController},
    math::fixed_point::{self, CYCLE_TIME_SCALE, OUTPUT_SCALE},
};

/// Run status of the session.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Freshly created or reset; not cycling.
    Init,
    /// Cycling.
    Start,
    /// Paused; may be started again or reset.
    Stop,
    /// Terminated.
    End,
}

/// Diagnostics of one completed control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleReport {
    /// Cycles since the last start from `Init`.
    pub counter: u64,
    /// Seconds since the previous cycle (zero for the first cycle after a start).
    pub cycle_time: Decimal,
    pub count_a: i64,
    pub count_b: i64,
    pub result: ControlResult,
}

impl fmt::Display for CycleReport {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "#{} {}s A={} B={} {}",
            self.counter, self.cycle_time, self.count_a, self.count_b, self.result
        )
    }
}

/// Operator-level model around a shared `PositionController`.
///
/// Gain and per-motor flags are forwarded to the controller, so an operator task
/// may also tune the controller directly while the session is cycling.
pub struct SyncSession<'a> {
    controller: &'a PositionController,
    status: RunStatus,
    setpoint_a: Decimal,
    setpoint_b: Decimal,
    simultaneous: bool,
    control_enabled: bool,
    counter: u64,
    last_cycle: Option<Instant>,
}

impl<'a> SyncSession<'a> {
    /// Create a session in `Init` with zero setpoints and control switched on.
    pub fn new(controller: &'a PositionController) -> Self {
        Self {
            controller,
            status: RunStatus::Init,
            setpoint_a: fixed_point::zero(OUTPUT_SCALE),
            setpoint_b: fixed_point::zero(OUTPUT_SCALE),
            simultaneous: false,
            control_enabled: true,
            counter: 0,
            last_cycle: None,
        }
    }

    pub fn controller(&self) -> &'a PositionController {
        self.controller
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Commanded setpoint of `motor`, at output scale.
    pub fn setpoint(
        &self,
        motor: Motor,
    ) -> Decimal {
        match motor {
            Motor::A => self.setpoint_a,
            Motor::B => self.setpoint_b,
        }
    }

    /// Command a new setpoint; in simultaneous mode both motors receive it.
    ///
    /// A value with no room for the output scale is ignored.
    pub fn set_setpoint(
        &mut self,
        motor: Motor,
        value: Decimal,
    ) {
        let Some(value) = fixed_point::to_output(value) else {
            tracing::warn!(?motor, %value, "setpoint not representable, keeping previous");
            return;
        };
        if self.simultaneous {
            self.setpoint_a = value;
            self.setpoint_b = value;
        } else {
            match motor {
                Motor::A => self.setpoint_a = value,
                Motor::B => self.setpoint_b = value,
            }
        }
        tracing::info!(?motor, %value, simultaneous = self.simultaneous, "setpoint");
    }

    pub fn is_simultaneous(&self) -> bool {
        self.simultaneous
    }

    pub fn set_simultaneous(
        &mut self,
        on: bool,
    ) {
        self.simultaneous = on;
    }

    pub fn is_control_enabled(&self) -> bool {
        self.control_enabled
    }

    /// Master switch: when off, setpoints pass through with zero correction.
    pub fn set_control_enabled(
        &mut self,
        on: bool,
    ) {
        self.control_enabled = on;
    }

    /// Execute an operator command, updating the session and, on reset, the rig.
    pub fn execute<R>(
        &mut self,
        command: SessionCommand,
        rig: &mut R,
    ) -> Result<(), SessionError>
    where
        R: MotorPair,
    {
        if self.status == RunStatus::End {
            return Err(SessionError::Ended);
        }
        tracing::info!(?command, status = ?self.status, "session command");

        match command {
            SessionCommand::Start => {
                self.transition(command, &[RunStatus::Init, RunStatus::Stop], RunStatus::Start)?;
                self.last_cycle = None;
            }
            SessionCommand::Stop => {
                self.transition(command, &[RunStatus::Start], RunStatus::Stop)?;
            }
            SessionCommand::Reset => {
                self.transition(command, &[RunStatus::Init, RunStatus::Stop], RunStatus::Init)?;
                self.counter = 0;
                self.last_cycle = None;
                self.setpoint_a = fixed_point::zero(OUTPUT_SCALE);
                self.setpoint_b = fixed_point::zero(OUTPUT_SCALE);
                rig.zero();
                rig.apply(self.setpoint_a, self.setpoint_b);
            }
            SessionCommand::End => {
                self.status = RunStatus::End;
                rig.apply(fixed_point::zero(OUTPUT_SCALE), fixed_point::zero(OUTPUT_SCALE));
            }
            SessionCommand::SetGain { g } => self.controller.set_gain(g),
            SessionCommand::SetSetpoint { m, v } => self.set_setpoint(m, v),
            SessionCommand::SetSimultaneous { on } => self.set_simultaneous(on),
            SessionCommand::SetControl { on } => self.set_control_enabled(on),
            SessionCommand::SetMotorControl { m: Motor::A, on } => {
                self.controller.set_motor_a_enabled(on)
            }
            SessionCommand::SetMotorControl { m: Motor::B, on } => {
                self.controller.set_motor_b_enabled(on)
            }
        }
        Ok(())
    }

    fn transition(
        &mut self,
        command: SessionCommand,
        allowed: &[RunStatus],
        next: RunStatus,
    ) -> Result<(), SessionError> {
        if !allowed.contains(&self.status) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                command,
            });
        }
        tracing::info!(from = ?self.status, to = ?next, "status change");
        self.status = next;
        Ok(())
    }

    /// Run one control cycle at `now` if the session is started.
    ///
    /// Reads both encoder counts, computes the corrected setpoints, and applies
    /// them to `rig`. Returns `None` without touching the rig when not started.
    pub fn run_cycle<R>(
        &mut self,
        now: Instant,
        rig: &mut R,
    ) -> Option<CycleReport>
    where
        R: MotorPair,
    {
        if self.status != RunStatus::Start {
            return None;
        }

        self.counter += 1;
        let cycle_time = match self.last_cycle {
            Some(past) => {
                let micros = now.saturating_duration_since(past).as_micros();
                let micros = i64::try_from(micros).unwrap_or(i64::MAX);
                fixed_point::rescale_half_up(Decimal::new(micros, 6), CYCLE_TIME_SCALE)
                    .unwrap_or_else(|| fixed_point::zero(CYCLE_TIME_SCALE))
            }
            None => fixed_point::zero(CYCLE_TIME_SCALE),
        };
        self.last_cycle = Some(now);

        let (count_a, count_b) = rig.counts();
        let result = if self.control_enabled {
            self.controller
                .step(self.setpoint_a, count_a, self.setpoint_b, count_b)
        } else {
            ControlResult::new(
                Some(fixed_point::zero(OUTPUT_SCALE)),
                Some(self.setpoint_a),
                Some(self.setpoint_b),
            )
        };
        rig.apply(result.output_a(), result.output_b());

        let report = CycleReport {
            counter: self.counter,
            cycle_time,
            count_a,
            count_b,
            result,
        };
        tracing::debug!(%report, "cycle");
        Some(report)
    }
}
