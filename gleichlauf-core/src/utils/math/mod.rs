//! Math utilities for the Gleichlauf controller.
//!
//! This module provides the fixed-point decimal scales and rounding rules the
//! controller uses for every externally visible value.

pub mod fixed_point;
