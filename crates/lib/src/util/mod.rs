//! Shared utilities.
//!
//! Content hashing plus helpers for tests.

pub mod hash;

#[cfg(test)]
pub mod testutil;
