//! CLI command implementations.

pub mod common;
pub mod config;
pub mod levels;
pub mod stream;
pub mod url;
