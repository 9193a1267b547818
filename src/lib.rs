//! heicforge - batch HEIC/HEIF to JPG conversion
//!
//! This library crate exposes the core functionality for integration testing.

pub mod batch;
pub mod codec;
pub mod config;
pub mod output;
pub mod server;
pub mod watch;
