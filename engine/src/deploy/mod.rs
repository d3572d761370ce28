//! External build and checkout tooling

pub mod docker;
pub mod git;
pub mod installer;
pub mod python;
