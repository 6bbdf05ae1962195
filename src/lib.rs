//! vidpress - batch video compression with ffmpeg
//!
//! This library crate exposes the dispatcher, configuration and HTTP front end
//! for the binary and for integration testing.

pub mod config;
pub mod dispatch;
pub mod server;
