//! Init command - create a new pool

use crate::cli::args::InitArgs;
use crate::cli::PoolOptions;
use crate::error::{PoolError, PoolResult};
use crate::pool::Pool;
use crate::ui::{self, UiContext};

/// Execute the init command
///
/// The pool is created at `--pool`, or in the current directory.
pub fn execute(args: InitArgs, options: &PoolOptions) -> PoolResult<()> {
    let ctx = UiContext::detect();
    let path = match &options.pool {
        Some(path) => path.clone(),
        None => std::env::current_dir()
            .map_err(|e| PoolError::io("getting current directory", e))?,
    };

    Pool::init_create(&path, &args.buildroot)?;
    ui::step_ok(&ctx, &format!("Initialized pool at {}", path.display()));
    Ok(())
}
