//! Dify plugin console tools
//!
//! Operator tooling for Dify plugin development: fetch a remote debugging key
//! and upload / replace / install plugin packages through the console API.
//!
//! This library backs the `get-debug-key` and `install-plugin` binaries and
//! the integration tests.

pub mod cli;
pub mod client;
pub mod credentials;
pub mod debug_key;
pub mod fields;
pub mod installer;
pub mod logging;
pub mod settings;
