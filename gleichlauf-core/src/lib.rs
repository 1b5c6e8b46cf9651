//! Position synchronization ("Gleichlauf") of two encoder-driven motors on no-std platforms.
//!
//! For a runnable host simulation, see the `gleichlauf-app/mock-rig` binary.
#![no_std]

pub mod utils;
