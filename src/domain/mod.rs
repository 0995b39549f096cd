//! Domain layer for the Vessel conversation engine
//!
//! This module contains the core data model, the port traits at the external
//! seams, and the error types.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{AbortDiagnostics, DomainError, DomainResult, TurnError};
