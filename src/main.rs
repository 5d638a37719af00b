mod app;
mod cli;
mod event;
mod tui;
mod ui;

use anyhow::Result;
use clap::Parser;

use qtimer::config::{Config, default_config_path};
use qtimer::{Core, logging};

fn main() -> Result<()> {
    let cli_opts = cli::Cli::parse();
    let config_path = cli_opts.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load(&config_path)?;

    // stderr belongs to the terminal UI when no command is given
    let mirror = cli_opts.verbose && cli_opts.command.is_some();
    if let Err(err) = logging::init(&logging::default_log_path(), &config.log.level, mirror) {
        eprintln!("Warning: {err}");
    }
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    let core = Core::open(config)?;
    if let Some(command) = cli_opts.command {
        let result = cli::run(command, &core);
        core.close()?;
        return result;
    }

    let mut app = app::App::new(core);
    let mut terminal = tui::init()?;
    let result = event::run(&mut app, &mut terminal);

    tui::restore()?;
    app.into_core().close()?;

    result
}
