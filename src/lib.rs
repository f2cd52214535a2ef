pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

// Layered boundaries: use cases and ports, then their adapters
pub mod app;
pub mod infra;
