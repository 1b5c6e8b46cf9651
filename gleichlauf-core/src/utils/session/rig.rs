//! Hardware seam between the session and a pair of encoder-driven motors.

use rust_decimal::Decimal;

/// A pair of motors with cumulative encoder counters.
///
/// Implemented by real drive electronics or by a simulation; the session reads
/// both counters once per cycle and writes the corrected setpoints back.
pub trait MotorPair {
    /// Current cumulative pulse counts of motor A and motor B.
    fn counts(&mut self) -> (i64, i64);

    /// Command new setpoints for motor A and motor B.
    fn apply(
        &mut self,
        output_a: Decimal,
        output_b: Decimal,
    );

    /// Zero both encoder counters.
    fn zero(&mut self) {}
}
