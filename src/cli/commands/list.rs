//! List command - show packages in the pool

use crate::cli::args::ListArgs;
use crate::cli::PoolOptions;
use crate::config::Config;
use crate::error::PoolResult;
use crate::ui::{self, UiContext};

/// Execute the list command
pub fn execute(args: ListArgs, options: &PoolOptions, config: &Config) -> PoolResult<()> {
    let ctx = UiContext::detect();
    let mut pool = options.open(config)?;
    let list = pool.list(args.all_versions, &args.globs)?;

    for glob in &list.missing {
        ui::step_warn(&ctx, &format!("{}: no matching packages", glob));
    }

    for package in &list.packages {
        if args.name_only {
            println!("{}", package.split_once('=').map_or(package.as_str(), |(n, _)| n));
        } else {
            println!("{}", package);
        }
    }
    Ok(())
}
