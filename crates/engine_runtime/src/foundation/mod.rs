//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types
//! - Category loggers over the `log` facade

pub mod math;
pub mod logging;
