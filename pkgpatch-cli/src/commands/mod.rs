//! CLI command implementations.

pub mod apply;
pub mod common;
pub mod config;
pub mod resolve;
