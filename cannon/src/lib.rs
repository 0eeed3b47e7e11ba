pub mod config;
pub mod env;
pub mod output;
pub mod paths;
pub mod tracing;
