//! Minimal configuration module for narrow core
//!
//! Only exports pure data types. All loading logic is in CLI layer.

pub mod types;

pub use types::{CaseMatching, DebounceConfig, FinderConfig, ForerunnerConfig, SessionOptions};
