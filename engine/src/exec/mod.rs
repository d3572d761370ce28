//! External command execution

pub mod command;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
