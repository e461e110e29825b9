//! Info commands - report on the pool and show build logs

use crate::cli::args::{InfoArgs, PackageArgs};
use crate::cli::PoolOptions;
use crate::config::Config;
use crate::error::{PoolError, PoolResult};
use crate::kernel::{InfoReport, InventoryEntry, PoolInfo};
use std::fs;

/// Execute the info command
pub fn execute(args: InfoArgs, options: &PoolOptions, config: &Config) -> PoolResult<()> {
    let mut pool = options.open(config)?;
    let infos = pool.kernel_mut().info(args.query(), args.recursive)?;

    for (i, info) in infos.iter().enumerate() {
        if args.recursive {
            if i > 0 {
                println!();
            }
            println!("### POOL_DIR={}", info.path.display());
        }
        print_info(info);
    }
    Ok(())
}

/// Execute the info-build command
pub fn info_build(args: PackageArgs, options: &PoolOptions, config: &Config) -> PoolResult<()> {
    let mut pool = options.open(config)?;
    let path = pool.build_log(&args.package)?;
    let log = fs::read_to_string(&path)
        .map_err(|e| PoolError::io(format!("reading {}", path.display()), e))?;
    print!("{}", log);
    Ok(())
}

fn print_info(info: &PoolInfo) {
    match &info.report {
        InfoReport::Registered { stocks, subpools } => {
            if !stocks.is_empty() {
                println!("# stocks");
                stocks.iter().for_each(|s| println!("{}", s));
            }
            if !subpools.is_empty() {
                if !stocks.is_empty() {
                    println!();
                }
                println!("# subpools");
                subpools.iter().for_each(|p| println!("{}", p.display()));
            }
        }
        InfoReport::Stocks(lines) | InfoReport::BuildLogs(lines) | InfoReport::PkgCache(lines) => {
            lines.iter().for_each(|l| println!("{}", l));
        }
        InfoReport::Subpools(paths) => paths.iter().for_each(|p| println!("{}", p.display())),
        InfoReport::BuildRoot(path) => println!("{}", path.display()),
        InfoReport::StockSources(entries) | InfoReport::StockBinaries(entries) => {
            for line in inventory_lines(entries) {
                println!("{}", line);
            }
        }
    }
}

/// Inventory as aligned `package  stock  dir` columns
fn inventory_lines(entries: &[InventoryEntry]) -> Vec<String> {
    let package_width = entries.iter().map(|e| e.package.len()).max().unwrap_or(0);
    let stock_width = entries.iter().map(|e| e.stock.len()).max().unwrap_or(0);
    entries
        .iter()
        .map(|e| {
            format!(
                "{:<pw$}  {:<sw$}  {}",
                e.package,
                e.stock,
                e.dir.display(),
                pw = package_width,
                sw = stock_width
            )
        })
        .collect()
}
