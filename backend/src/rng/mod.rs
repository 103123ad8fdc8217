//! Deterministic random number generation
//!
//! Uses xorshift64* for fast, reproducible draws. The CTMC engines never own
//! a generator: drivers draw one word per transition and pass it in, so the
//! same seed always reproduces the same trajectory.

mod xorshift;

pub use xorshift::RngManager;
