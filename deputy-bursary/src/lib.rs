pub mod api;
pub mod cli;
pub mod load_config;
pub mod output;
pub mod students;

pub use cli::{run, Cli, Commands};
