pub mod cli;
pub mod load_config;
pub mod monitor;
pub mod upload;

pub use cli::{run, run_until, Cli};
