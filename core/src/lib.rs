//! # narrow Core
//!
//! Core library for narrow - the asynchronous filtering layer of a fuzzy
//! finder.
//!
//! This library turns a stream of query edits into ranked result batches by
//! driving an external matching worker, prefetching candidates ahead of
//! typing, and making sure only results for the current query are ever
//! shown.

// Core modules
pub mod cache;
pub mod config;
pub mod error;
pub mod generation;
pub mod job;
pub mod output;
pub mod preview;
pub mod process;
pub mod router;
pub mod session;

// Re-export commonly used types
pub use cache::{CacheEntry, ForerunnerCache};
pub use config::{FinderConfig, SessionOptions};
pub use error::{Error, Result};
pub use generation::{Generation, GenerationClock};
pub use job::{SearchMode, SourceKind};
pub use output::{ChannelSink, DisplayEvent, DisplaySink, NullSink, PreviewSink, ResultBatch};
pub use process::TokioProcessRunner;
pub use session::{spawn_session, Session, SessionContext, SessionHandle};

/// Current version of the narrow-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

