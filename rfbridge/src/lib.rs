//! # rfbridge — display bridge runner
//!
//! Runs one `rfbridge-core` display session against an in-process
//! synthetic framebuffer server, draining the outward instruction
//! stream and logging what reached the client.
//!
//! Useful for exercising frame pacing, copy-rect suppression, cursor
//! rendering and teardown end to end without a VNC host.

pub mod config;
pub mod service;
pub mod synthetic;
