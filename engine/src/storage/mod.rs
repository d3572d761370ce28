//! Deployment root layout

pub mod layout;
