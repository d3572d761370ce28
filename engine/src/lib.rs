//! Shipwright deployment engine
//!
//! Turns a pushed revision into a running, health-checked release using
//! one of three strategies: simple, rolling or blue-green.

pub mod cli;
pub mod clock;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod exec;
pub mod filesys;
pub mod health;
pub mod logs;
pub mod models;
pub mod orchestrator;
pub mod procman;
pub mod release;
pub mod storage;
pub mod strategy;
pub mod utils;

pub use errors::DeployError;
pub use orchestrator::Orchestrator;
