mod cli;
mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use labeltrack::config::default_config_path;
use labeltrack::{load_config, load_config_or_default, Config, JobLifecycle, SqliteStore};

use cli::{Cli, Command};
use commands::Output;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => match default_config_path() {
            Some(path) => load_config_or_default(&path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        },
    };
    Ok(config)
}

fn database_path(cli: &Cli, config: &Config) -> anyhow::Result<PathBuf> {
    cli.db
        .clone()
        .or_else(|| config.database_path())
        .context("no database path: pass --db or set databasePath")
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load(&cli)?;

    let env_level = std::env::var("RUST_LOG").ok();
    let level = logging::resolve_level(
        cli.log_level.as_deref(),
        env_level.as_deref(),
        &config.logging.level,
    );
    logging::init_logging(&level, config.logging.format)?;

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    let mut output = Output {
        out: &mut lock,
        json: cli.json,
    };

    if let Command::Layout(args) = &cli.command {
        return commands::layout(&config, args, &mut output);
    }

    let path = database_path(&cli, &config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tracing::debug!(path = %path.display(), "opening database");
    let store = SqliteStore::open(&path)
        .with_context(|| format!("opening database {}", path.display()))?;
    let lifecycle = JobLifecycle::from_config(store, &config);

    let ctx = commands::context(cli.actor.as_deref());
    commands::run(&lifecycle, &config, cli.command, &ctx, &mut output)
}
