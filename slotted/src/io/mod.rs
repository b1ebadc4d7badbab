//! File-backed inputs for the scenario harness.

pub mod config;
pub mod init;
pub mod scenario;
