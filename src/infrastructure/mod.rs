//! Infrastructure layer: configuration, logging and persistence.

pub mod config;
pub mod logging;
pub mod persistence;
