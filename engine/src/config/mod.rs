//! App and host configuration

pub mod app;
pub mod host;
pub mod loader;
pub mod timings;

pub use app::{AppConfig, AppType, DeploymentOptions, HookPoint, Hooks, SmokeTest, StrategyKind};
pub use host::{HostConfig, ManagerKind, MonitoringConfig};
pub use timings::Timings;
