//! CLI command implementations

pub mod config;
pub mod crash;
pub mod submit;
