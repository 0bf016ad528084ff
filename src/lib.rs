//! Planetary colony simulation
//!
//! Rebuilds a colony's extraction and production history from its installed
//! facilities alone: build a [`models::Colony`] from the API description with
//! [`builder::build_colony`], then replay it with [`simulator::simulate`].

pub mod builder;
pub mod catalog;
pub mod config;
pub mod db;
pub mod description;
pub mod error;
pub mod extraction;
pub mod import;
pub mod models;
pub mod report;
pub mod simulator;
pub mod timespec;

/// Slack allowed when comparing stored volume against capacity, in m3
pub const VOLUME_EPSILON: f64 = 1e-6;

pub use builder::build_colony;
pub use error::{BuildError, SimulationWarning, ValidationError};
pub use simulator::{Simulation, SimulationReport, simulate};
