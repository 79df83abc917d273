//! Domain types, error taxonomy, configuration and cross-cutting ports
//! shared by every ConectaSEI crate.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod secrets;
pub mod validation;

pub use domain::*;
pub use error::{ConectaError, Result};
