//! ngxgen Core Library
//!
//! This crate provides the canonical nginx site model shared by the parser,
//! generator, validator and linter, together with deep-merge patches,
//! TLS preset tables, shipped presets and model loading.

pub mod config;
pub mod error;

pub use error::{Error, Result};

/// ngxgen version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
