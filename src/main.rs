//! Pool - composable Debian package pool
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use pool::cli::{commands, Cli, Commands, PoolOptions};
use pool::config::{Config, ConfigManager};
use pool::error::PoolResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Overrides the configured log level when no -v is given
const LOG_LEVEL_ENV: &str = "POOL_LOG_LEVEL";

/// Forces debug logging when set
const DEBUG_ENV: &str = "DEBUG";

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> PoolResult<ExitCode> {
    let cli = Cli::parse();

    // The worker speaks the protocol on stdout and takes its tools from
    // the init frame, so it neither loads config nor logs to stdout
    if let Commands::Worker = cli.command {
        init_logging(cli.verbose, &Config::default());
        debug!("starting worker");
        pool::proxy::run_worker(&mut std::io::stdin().lock(), &mut std::io::stdout().lock())?;
        return Ok(ExitCode::SUCCESS);
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load()?;
    // debug mode, or DEBUG set to anything, turns on debug logging
    let debug_logging = cli.debug || std::env::var_os(DEBUG_ENV).is_some();
    let verbose = if debug_logging { cli.verbose.max(2) } else { cli.verbose };
    init_logging(verbose, &config);

    let options = PoolOptions {
        pool: cli.pool.clone(),
        debug: cli.debug,
    };

    match cli.command {
        Commands::Init(args) => commands::init(args, &options)?,
        Commands::Register(args) => commands::register(args, &options, &config)?,
        Commands::Unregister(args) => commands::unregister(args, &options, &config)?,
        Commands::Exists(args) => return commands::exists(args, &options, &config),
        Commands::List(args) => commands::list(args, &options, &config)?,
        Commands::Get(args) => return commands::get(args, &options, &config),
        Commands::Getpath(args) => commands::getpath(args, &options, &config)?,
        Commands::Resolve(args) => commands::resolve(args, &options, &config)?,
        Commands::Gc(args) => commands::gc(args, &options, &config)?,
        Commands::Info(args) => commands::info(args, &options, &config)?,
        Commands::InfoBuild(args) => commands::info_build(args, &options, &config)?,
        Commands::Config(args) => commands::config(args, &manager, &config)?,
        Commands::Completions(args) => commands::completions(args)?,
        Commands::Worker => unreachable!("worker handled above"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Log to stderr: 0 = configured level, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| config.general.log_level.clone()),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    };
    let filter = EnvFilter::try_new(format!("pool={}", level))
        .unwrap_or_else(|_| EnvFilter::new("pool=warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
