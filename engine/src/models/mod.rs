//! Data models

pub mod deployment;
pub mod health;
pub mod release;
pub mod slot;
