pub mod process;

pub use process::{CommandRunner, OutputMode, ProcessRunner, ToolCommand, ToolOutput};
