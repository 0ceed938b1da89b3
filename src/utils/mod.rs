//! Utility Module
//! Created: 2025-06-04
//!
//! Run logging, metrics and the configuration trait shared by configurable
//! components.

pub mod logging;
pub mod metrics;

pub use self::{
    logging::{LogEntry, LogLevel, RunLog},
    metrics::{Metrics, MetricsSnapshot},
};

use crate::error::Result;

/// Key/value access and validation for configurable components
pub trait UtilityConfig: Send + Sync {
    fn validate(&self) -> Result<()>;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}
