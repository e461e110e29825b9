//! Register and unregister commands

use crate::cli::args::StockArgs;
use crate::cli::PoolOptions;
use crate::config::Config;
use crate::error::PoolResult;
use crate::ui::{self, UiContext};

/// Execute the register command
pub fn register(args: StockArgs, options: &PoolOptions, config: &Config) -> PoolResult<()> {
    let mut pool = options.open(config)?;
    pool.kernel_mut().register(&args.stock)?;
    ui::step_ok(&UiContext::detect(), &format!("Registered {}", args.stock));
    Ok(())
}

/// Execute the unregister command
pub fn unregister(args: StockArgs, options: &PoolOptions, config: &Config) -> PoolResult<()> {
    let mut pool = options.open(config)?;
    pool.kernel_mut().unregister(&args.stock)?;
    ui::step_ok(&UiContext::detect(), &format!("Unregistered {}", args.stock));
    Ok(())
}
