pub mod cli;
pub mod telemetry;

pub use cli::{run, Cli, Commands};
