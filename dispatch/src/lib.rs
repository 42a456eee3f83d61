//! Delivery dispatch sequencing.
//!
//! Orders one assignee's deliveries for one day. Items may only be moved a
//! single step at a time, and urgent deliveries never swap places with
//! regular ones. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (constraint check, adjacent moves,
//!   id validation). No I/O.
//! - **[`io`]**: Configuration, scaffolding and the [`io::service::SequenceService`]
//!   backends that load and persist sequences.
//!
//! [`session`] owns one screen's editing state and ties the two together;
//! [`resequence`] drives a session for the CLI.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod notice;
pub mod resequence;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
