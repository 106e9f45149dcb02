pub mod commands;

pub use commands::{build_cli, parse_config, usage};
