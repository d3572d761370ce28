//! Release snapshot management

pub mod manager;

pub use manager::{ReleaseManager, KEEP_RELEASES};
