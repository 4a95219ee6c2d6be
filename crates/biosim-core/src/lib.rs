//! Core types and utilities for the BioSim island ecosystem simulation.

pub mod types;
pub mod config;
pub mod error;

pub use error::{Error, GeographyError, Result};
pub use types::*;
pub use config::*;
