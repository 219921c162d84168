pub mod commerce;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod telemetry;
pub mod workflows;
