//! Deterministic, pure logic for dispatch sequencing.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod constraint;
pub mod invariants;
pub mod reorder;
pub mod types;
