//! Presentation layer for council
//!
//! clap command definitions and the console front-end: a streaming renderer
//! implementing the flow observer port and the interactive checkpoint
//! prompt. The richer panel TUI is a separate collaborator built on the
//! same ports.

pub mod cli;
pub mod console;

pub use cli::commands::{Cli, Commands, FlowCommands};
pub use console::{ConsolePresenter, InteractiveCheckpoint};
