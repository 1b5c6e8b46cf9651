//! Simulated motor pair with quadrature encoders.
//!
//! Each motor turns at `setpoint * gear` revolutions per second; the encoder
//! accumulates `pulses_per_rev` pulses per revolution. Fractional pulses are
//! carried over between cycles so the counts stay exact.

use embassy_time::Duration;
use gleichlauf_core::utils::MotorPair;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

struct SimMotor {
    gear: Decimal,
    setpoint: Decimal,
    count: i64,
    residue: Decimal,
}

impl SimMotor {
    fn new(gear: Decimal) -> Self {
        Self {
            gear,
            setpoint: Decimal::ZERO,
            count: 0,
            residue: Decimal::ZERO,
        }
    }

    fn advance(
        &mut self,
        pulses_per_rev: Decimal,
        seconds: Decimal,
    ) {
        let travelled = self
            .setpoint
            .checked_mul(self.gear)
            .and_then(|v| v.checked_mul(pulses_per_rev))
            .and_then(|v| v.checked_mul(seconds))
            .and_then(|v| v.checked_add(self.residue));
        let Some(travelled) = travelled else {
            warn!(setpoint = %self.setpoint, "travel overflows, holding motor");
            return;
        };
        let whole = travelled.trunc();
        self.residue = travelled - whole;
        self.count = self.count.wrapping_add(whole.to_i64().unwrap_or(0));
    }
}

/// Two simulated motors; motor B's gear differs by `mismatch` so the pair drifts.
pub struct SimRig {
    pulses_per_rev: Decimal,
    a: SimMotor,
    b: SimMotor,
}

impl SimRig {
    pub fn new(
        pulses_per_rev: u32,
        mismatch: Decimal,
    ) -> Self {
        Self {
            pulses_per_rev: Decimal::from(pulses_per_rev),
            a: SimMotor::new(Decimal::ONE),
            b: SimMotor::new(Decimal::ONE + mismatch),
        }
    }

    /// Let both motors run for `elapsed` at their current setpoints.
    pub fn advance(
        &mut self,
        elapsed: Duration,
    ) {
        let micros = i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX);
        let seconds = Decimal::new(micros, 6);
        self.a.advance(self.pulses_per_rev, seconds);
        self.b.advance(self.pulses_per_rev, seconds);
    }
}

impl MotorPair for SimRig {
    fn counts(&mut self) -> (i64, i64) {
        (self.a.count, self.b.count)
    }

    fn apply(
        &mut self,
        output_a: Decimal,
        output_b: Decimal,
    ) {
        self.a.setpoint = output_a;
        self.b.setpoint = output_b;
    }

    fn zero(&mut self) {
        for m in [&mut self.a, &mut self.b] {
            m.count = 0;
            m.residue = Decimal::ZERO;
        }
    }
}
