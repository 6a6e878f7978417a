//! Swap collection library
//!
//! This crate provides the core functionality for:
//! - Reading swap space and paging activity from the host OS
//! - Normalizing raw readings into canonical metric families
//! - Dispatching families to Prometheus or JSON sinks
//! - Health checks and observability for the agent

pub mod collector;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod plugin;
pub mod sink;

pub use config::{Capabilities, SwapConfig};
pub use error::{CollectError, DispatchError, ErrorKind, InitError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use metrics::{FamilyRegistry, MetricFamily, MetricRecord, MetricType, MetricValue};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use plugin::{CycleReport, SwapContext, SwapPlugin};
