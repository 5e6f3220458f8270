//! `tenantgate-app`: configuration, wiring and dashboard views.

pub mod app;
pub mod config;
pub mod dashboard;

pub use app::{App, ProvisionError, Screen};
pub use config::{ConfigError, GateConfig};
pub use dashboard::{DashboardContext, DashboardError, DashboardKind};
