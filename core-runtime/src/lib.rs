//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the player crates:
//! - Logging and tracing initialization
//! - Runtime error type
//!
//! ## Overview
//!
//! This crate establishes the logging conventions used throughout the
//! system. Everything else lives with the subsystem it belongs to.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
