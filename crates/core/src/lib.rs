//! Core data model, error taxonomy, configuration, and collaborator
//! interfaces for the DripExpress campaign runner.

pub mod channels;
pub mod config;
pub mod error;
pub mod provider;
pub mod schedule;
pub mod types;

pub use config::AppConfig;
pub use error::{DripError, DripResult};
pub use schedule::{DripSchedule, DripStep};
