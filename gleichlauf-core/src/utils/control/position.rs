//! Proportional position controller for two synchronized motors.
//!
//! The controller converts the pulse-count mismatch between motor A and motor B
//! into a symmetric correction: it is subtracted from A's setpoint and added to
//! B's, so a leading motor is held back while the lagging one catches up.
//!
//! Configuration (gain and per-motor enable flags) may be changed from another
//! task or thread while a control loop is stepping. It lives behind a blocking
//! mutex and every `step` works on one coherent snapshot.
//!
//! # Example
//! ```rust
//! use gleichlauf_core::utils::control::PositionController;
//! use rust_decimal::Decimal;
//!
//! let ctrl = PositionController::new(100);
//! ctrl.set_gain(Decimal::new(20, 1));
//! ctrl.set_motor_a_enabled(true);
//! ctrl.set_motor_b_enabled(true);
//! let out = ctrl.step(Decimal::new(10, 0), 150, Decimal::new(10, 0), 100);
//! assert_eq!(out.to_string(), "[1.000 9.000 11.000]");
//! ```
use core::{cell::Cell, fmt, num::NonZeroU32};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::utils::math::fixed_point::{self, OUTPUT_SCALE, WORKING_SCALE};

/// Operator-adjustable controller settings.
///
/// Copied out as a whole for each step so that a gain change and a flag change
/// made together are never observed half-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerConfig {
    /// Proportional gain as entered by the operator.
    pub gain: Decimal,
    /// Apply the correction to motor A's setpoint.
    pub motor_a_enabled: bool,
    /// Apply the correction to motor B's setpoint.
    pub motor_b_enabled: bool,
}

/// Single-step proportional position regulator.
pub struct PositionController {
    /// Encoder pulses per revolution, at least 1.
    encoder_resolution: NonZeroU32,
    config: Mutex<CriticalSectionRawMutex, Cell<ControllerConfig>>,
}

impl PositionController {
    /// Create a controller for encoders with `encoder_resolution` pulses per revolution.
    ///
    /// Values below 1 are clamped to 1. Gain starts at zero and both motors start
    /// with the correction disabled.
    pub fn new(encoder_resolution: i32) -> Self {
        let clamped = u32::try_from(encoder_resolution.max(1)).unwrap_or(1);
        Self {
            encoder_resolution: NonZeroU32::new(clamped).unwrap_or(NonZeroU32::MIN),
            config: Mutex::new(Cell::new(ControllerConfig::default())),
        }
    }

    /// Encoder pulses per revolution used as divisor of the gain.
    pub fn encoder_resolution(&self) -> NonZeroU32 {
        self.encoder_resolution
    }

    /// Coherent copy of the current configuration.
    pub fn config(&self) -> ControllerConfig {
        self.config.lock(|c| c.get())
    }

    /// Apply several configuration changes atomically.
    pub fn update<F>(
        &self,
        f: F,
    ) where
        F: FnOnce(&mut ControllerConfig),
    {
        self.config.lock(|c| {
            let mut cfg = c.get();
            f(&mut cfg);
            c.set(cfg);
        });
    }

    /// Current proportional gain.
    pub fn gain(&self) -> Decimal {
        self.config().gain
    }

    /// Replace the gain; `None` resets it to zero.
    pub fn set_gain<G>(
        &self,
        gain: G,
    ) where
        G: Into<Option<Decimal>>,
    {
        let gain = gain.into().unwrap_or(Decimal::ZERO);
        self.update(|cfg| cfg.gain = gain);
        tracing::debug!(%gain, "gain updated");
    }

    pub fn is_motor_a_enabled(&self) -> bool {
        self.config().motor_a_enabled
    }

    pub fn set_motor_a_enabled(
        &self,
        enabled: bool,
    ) {
        self.update(|cfg| cfg.motor_a_enabled = enabled);
    }

    pub fn is_motor_b_enabled(&self) -> bool {
        self.config().motor_b_enabled
    }

    pub fn set_motor_b_enabled(
        &self,
        enabled: bool,
    ) {
        self.update(|cfg| cfg.motor_b_enabled = enabled);
    }

    /// Proportional factor `gain / encoder_resolution` at the working scale, rounded up.
    pub fn proportional_factor(&self) -> Option<Decimal> {
        fixed_point::ceil_div(self.gain(), self.encoder_resolution, WORKING_SCALE)
    }

    /// Run one control step.
    ///
    /// `count_a`/`count_b` are the cumulative encoder pulses; their difference is
    /// taken in `i128` and cannot overflow. The correction depends only on the
    /// configuration and the counts, never on the setpoints.
    pub fn step(
        &self,
        setpoint_a: Decimal,
        count_a: i64,
        setpoint_b: Decimal,
        count_b: i64,
    ) -> ControlResult {
        let cfg = self.config();
        let position_delta = i128::from(count_a) - i128::from(count_b);

        let correction = fixed_point::ceil_div(cfg.gain, self.encoder_resolution, WORKING_SCALE)
            .and_then(|factor| fixed_point::mul_half_up(position_delta, factor, OUTPUT_SCALE));

        let output_a = if cfg.motor_a_enabled {
            correction.and_then(|c| setpoint_a.checked_sub(c))
        } else {
            Some(setpoint_a)
        };
        let output_b = if cfg.motor_b_enabled {
            correction.and_then(|c| setpoint_b.checked_add(c))
        } else {
            Some(setpoint_b)
        };

        let result = ControlResult::new(
            correction,
            output_a.and_then(fixed_point::to_output),
            output_b.and_then(fixed_point::to_output),
        );
        tracing::debug!(position_delta = %position_delta, %result, "control step");
        result
    }
}

impl Default for PositionController {
    fn default() -> Self {
        Self::new(1)
    }
}

impl fmt::Debug for PositionController {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("PositionController")
            .field("encoder_resolution", &self.encoder_resolution)
            .field("config", &self.config())
            .finish()
    }
}

/// Outcome of one control step: the correction and both corrected setpoints.
///
/// All three values are present and carry the output scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlResult {
    correction: Decimal,
    output_a: Decimal,
    output_b: Decimal,
}

impl ControlResult {
    /// Build a result, substituting `0.000` for any absent value.
    pub fn new(
        correction: Option<Decimal>,
        output_a: Option<Decimal>,
        output_b: Option<Decimal>,
    ) -> Self {
        Self {
            correction: Self::or_zero("correction", correction),
            output_a: Self::or_zero("output_a", output_a),
            output_b: Self::or_zero("output_b", output_b),
        }
    }

    fn or_zero(
        name: &'static str,
        value: Option<Decimal>,
    ) -> Decimal {
        match value.and_then(fixed_point::to_output) {
            Some(v) => v,
            None => {
                tracing::warn!("{} not representable, substituting zero", name);
                fixed_point::zero(OUTPUT_SCALE)
            }
        }
    }

    pub fn correction(&self) -> Decimal {
        self.correction
    }

    pub fn output_a(&self) -> Decimal {
        self.output_a
    }

    pub fn output_b(&self) -> Decimal {
        self.output_b
    }
}

impl fmt::Display for ControlResult {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "[{} {} {}]", self.correction, self.output_a, self.output_b)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use rust_decimal_macros::dec;
    use std::string::ToString;

    fn both_enabled(
        resolution: i32,
        gain: Decimal,
    ) -> PositionController {
        let ctrl = PositionController::new(resolution);
        ctrl.update(|cfg| {
            cfg.gain = gain;
            cfg.motor_a_enabled = true;
            cfg.motor_b_enabled = true;
        });
        ctrl
    }

    #[test]
    fn test_resolution_clamped_to_one() {
        for r in [i32::MIN, -5, 0, 1] {
            assert_eq!(PositionController::new(r).encoder_resolution().get(), 1);
        }
        assert_eq!(PositionController::new(2).encoder_resolution().get(), 2);
        assert_eq!(PositionController::new(i32::MAX).encoder_resolution().get(), i32::MAX as u32);
    }

    #[test]
    fn test_defaults() {
        let ctrl = PositionController::new(360);
        assert!(ctrl.gain().is_zero());
        assert!(!ctrl.is_motor_a_enabled());
        assert!(!ctrl.is_motor_b_enabled());
    }

    #[test]
    fn test_set_gain_none_is_zero() {
        let ctrl = PositionController::new(10);
        ctrl.set_gain(dec!(1.5));
        assert_eq!(ctrl.gain(), dec!(1.5));
        ctrl.set_gain(None);
        assert!(ctrl.gain().is_zero());
    }

    #[test]
    fn test_end_to_end_scenario() {
        let ctrl = both_enabled(100, dec!(2.0));
        assert_eq!(ctrl.proportional_factor().unwrap().to_string(), "0.020000");
        let out = ctrl.step(dec!(10.000), 150, dec!(10.000), 100);
        assert_eq!(out.correction().to_string(), "1.000");
        assert_eq!(out.output_a().to_string(), "9.000");
        assert_eq!(out.output_b().to_string(), "11.000");
        assert_eq!(out.to_string(), "[1.000 9.000 11.000]");
    }

    #[test]
    fn test_one_third_rounding() {
        let ctrl = both_enabled(3, dec!(1));
        assert_eq!(ctrl.proportional_factor().unwrap().to_string(), "0.333334");
        let out = ctrl.step(dec!(0), 1, dec!(0), 0);
        assert_eq!(out.correction().to_string(), "0.333");
    }

    #[test]
    fn test_zero_gain_gives_zero_correction() {
        let ctrl = both_enabled(7, Decimal::ZERO);
        for (a, b) in [(0, 0), (1_000, -1_000), (i64::MAX, i64::MIN)] {
            let out = ctrl.step(dec!(5), a, dec!(5), b);
            assert!(out.correction().is_zero());
            assert_eq!(out.output_a().to_string(), "5.000");
        }
    }

    #[test]
    fn test_equal_counts_give_zero_correction() {
        let ctrl = both_enabled(1, dec!(123.456));
        let out = ctrl.step(dec!(1.5), 42, dec!(2.25), 42);
        assert_eq!(out.to_string(), "[0.000 1.500 2.250]");
    }

    #[test]
    fn test_convergence_direction() {
        let ctrl = both_enabled(10, dec!(1));
        let ahead = ctrl.step(dec!(10), 20, dec!(10), 10);
        assert!(ahead.output_a() < dec!(10));
        assert!(ahead.output_b() > dec!(10));

        let behind = ctrl.step(dec!(10), 10, dec!(10), 20);
        assert!(behind.output_a() > dec!(10));
        assert!(behind.output_b() < dec!(10));
    }

    #[test]
    fn test_disabled_motor_passes_through() {
        let ctrl = PositionController::new(4);
        ctrl.set_gain(dec!(8));
        ctrl.set_motor_b_enabled(true);
        let out = ctrl.step(dec!(3.14159), 100, dec!(3), 0);
        assert_eq!(out.correction().to_string(), "200.000");
        assert_eq!(out.output_a().to_string(), "3.142");
        assert_eq!(out.output_b().to_string(), "203.000");
    }

    #[test]
    fn test_extreme_counts_do_not_overflow() {
        let ctrl = both_enabled(1, dec!(0.001));
        let out = ctrl.step(dec!(0), i64::MAX, dec!(0), i64::MIN);
        // (2^64 - 1) * 0.001
        assert_eq!(out.correction().to_string(), "18446744073709551.615");
    }

    #[test]
    fn test_unrepresentable_correction_substitutes_zero() {
        let ctrl = both_enabled(1, Decimal::MAX);
        let out = ctrl.step(dec!(1), i64::MAX, dec!(2), 0);
        assert_eq!(out.to_string(), "[0.000 0.000 0.000]");
    }

    #[test]
    fn test_setpoint_without_room_for_output_scale_substitutes_zero() {
        let ctrl = PositionController::new(1);
        let out = ctrl.step(Decimal::MAX, 0, Decimal::from_i128_with_scale(10i128.pow(24), 0), 0);
        assert_eq!(out.output_a().to_string(), "0.000");
        assert_eq!(out.output_b().to_string(), "1000000000000000000000000.000");
        for v in [out.correction(), out.output_a(), out.output_b()] {
            assert_eq!(v.scale(), OUTPUT_SCALE);
        }

        ctrl.update(|cfg| cfg.motor_a_enabled = true);
        let out = ctrl.step(Decimal::MAX, 0, dec!(1), 0);
        assert_eq!(out.output_a().to_string(), "0.000");
    }

    #[test]
    fn test_result_new_substitutes_zero() {
        let r = ControlResult::new(None, Some(dec!(1.25)), None);
        assert_eq!(r.to_string(), "[0.000 1.250 0.000]");
    }
}
