//! # chainlog-contracts
//!
//! Shared types for the chainlog tamper-evident audit log.
//!
//! All crates in the workspace import from here. No hashing or file I/O
//! lives in this crate, only data definitions, configuration loading, and
//! error types.

pub mod config;
pub mod error;
pub mod record;
pub mod report;
