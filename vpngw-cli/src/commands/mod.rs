//! Command handlers -- one module per subcommand

pub mod config;
pub mod destroy;
pub mod list;
pub mod run;
