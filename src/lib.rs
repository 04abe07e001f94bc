//! SHELF Application Library
//!
//! This library provides the application modules for the SHELF books API.

pub mod modules;

/// Re-export commonly used types
pub use modules::*;
