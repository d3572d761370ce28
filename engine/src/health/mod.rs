//! HTTP health probing

pub mod client;
pub mod prober;

pub use client::{HttpClient, HttpResponse, ReqwestClient};
pub use prober::{local_url, HealthProber};
