//! I/O helpers: configuration, scaffolding and sequence storage backends.

pub mod config;
pub mod file_store;
pub mod init;
pub mod service;
