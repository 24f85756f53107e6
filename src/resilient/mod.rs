//! Idempotent get-or-create primitives for target resources

pub mod ops;

pub use ops::*;
