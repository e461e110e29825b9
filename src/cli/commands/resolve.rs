//! Resolve command - print packages with their newest version

use crate::cli::args::ResolveArgs;
use crate::cli::PoolOptions;
use crate::config::Config;
use crate::error::PoolResult;

/// Execute the resolve command
pub fn execute(args: ResolveArgs, options: &PoolOptions, config: &Config) -> PoolResult<()> {
    let mut pool = options.open(config)?;
    for package in pool.kernel_mut().resolve(&args.packages)? {
        println!("{}", package);
    }
    Ok(())
}
