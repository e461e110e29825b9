//! Exists command - prints true or false

use crate::cli::args::PackageArgs;
use crate::cli::PoolOptions;
use crate::config::Config;
use crate::error::PoolResult;
use std::process::ExitCode;

/// Execute the exists command. Exits 1 when the package does not exist.
pub fn execute(args: PackageArgs, options: &PoolOptions, config: &Config) -> PoolResult<ExitCode> {
    let mut pool = options.open(config)?;
    if pool.kernel_mut().exists(&args.package)? {
        println!("true");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("false");
        Ok(ExitCode::FAILURE)
    }
}
