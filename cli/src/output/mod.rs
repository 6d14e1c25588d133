//! CLI-specific output implementations
//!
//! Sessions never write to stdout themselves: their sinks queue events for
//! a single writer task, so a slow reader cannot stall a session loop.

pub mod stdio;

pub use stdio::{spawn_writer, StdioSink};
