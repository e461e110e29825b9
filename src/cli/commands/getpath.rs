//! Getpath command - print the path of a package

use crate::cli::args::GetpathArgs;
use crate::cli::PoolOptions;
use crate::config::Config;
use crate::error::{PoolError, PoolResult};

/// Execute the getpath command
pub fn execute(args: GetpathArgs, options: &PoolOptions, config: &Config) -> PoolResult<()> {
    let mut pool = options.open(config)?;
    let path = pool
        .kernel_mut()
        .getpath(&args.package, !args.no_build, args.source)?
        .ok_or_else(|| PoolError::NoSuchPackage(args.package.clone()))?;
    println!("{}", path.display());
    Ok(())
}
