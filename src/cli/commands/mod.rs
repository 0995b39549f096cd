//! CLI command implementations.

pub mod chat;
pub mod config;
pub mod pods;
pub mod rhythm;
pub mod scratch;
