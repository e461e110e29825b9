//! Gc command - evict cached packages no stock references

use crate::cli::args::GcArgs;
use crate::cli::PoolOptions;
use crate::config::Config;
use crate::error::PoolResult;
use crate::ui::{self, UiContext};

/// Execute the gc command
pub fn execute(args: GcArgs, options: &PoolOptions, config: &Config) -> PoolResult<()> {
    let ctx = UiContext::detect();
    let mut pool = options.open(config)?;
    let report = pool.kernel_mut().gc(!args.no_recursion)?;

    ui::step_info(
        &ctx,
        &format!("ignoring {} whitelisted items", report.whitelisted),
    );
    for package in &report.removed {
        println!("pkgcache: removing {}", package);
    }
    ui::step_ok(&ctx, &format!("Removed {} package(s)", report.removed.len()));
    Ok(())
}
