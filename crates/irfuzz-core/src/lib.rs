//! Core types and utilities shared by the IRFuzz mutation engine and its harness.

pub mod types;
pub mod config;
pub mod error;

pub use error::{Error, Result};
pub use types::*;
pub use config::*;
