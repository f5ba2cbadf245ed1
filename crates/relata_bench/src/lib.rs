//! Benchmark support for Relata.

pub mod utils;
