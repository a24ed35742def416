//! CLI module for the `outcore` tool.
//!
//! This module provides the command-line interface that runs the plan,
//! apply, and refresh walks over a scenario file.

mod commands;
mod output;
mod session;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::{display_value, OutputFormatter, REDACTED};
pub use session::{PlanReport, Session, WalkReport};
