//! RepoStats CLI support: argument parsing and report export

pub mod args;
pub mod export;

pub use args::{namespace_arg, Cli, Commands, SyncArgs};
pub use export::export_reports;
