pub mod app;
pub mod commands;
pub mod display;

pub use app::{
    init_config, load_config, render_config, resolve_config, run_connect, show_config,
    ConnectOptions,
};
pub use commands::{Cli, Commands, ConfigCommand};
pub use display::{format_event, format_summary};
