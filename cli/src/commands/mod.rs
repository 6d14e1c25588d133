//! CLI command implementations

pub mod args;
pub mod run;
pub mod serve;

pub use args::args_command;
pub use run::run_command;
pub use serve::serve_command;
