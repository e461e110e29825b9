//! Get command - fetch packages into a directory

use crate::cli::args::GetArgs;
use crate::cli::PoolOptions;
use crate::config::Config;
use crate::error::{PoolError, PoolResult};
use crate::ui::{self, TaskSpinner, UiContext};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;

/// Execute the get command.
///
/// Exits 1 if any package is missing, unless `--quiet`.
pub fn execute(args: GetArgs, options: &PoolOptions, config: &Config) -> PoolResult<ExitCode> {
    let ctx = UiContext::detect().with_quiet(args.quiet);
    let mut pool = options.open(config)?;

    let mut packages = args.packages.clone();
    if let Some(input) = &args.input {
        packages.extend(parse_package_list(&read_input(input)?));
    }
    if args.packages.is_empty() && args.input.is_none() {
        packages = pool.list(false, &[])?.packages;
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Getting {} package(s)...", packages.len()));
    let list = match pool.get(&args.output_dir, &packages, args.tree, args.strict, args.source) {
        Ok(list) => list,
        Err(e) => {
            spinner.stop_error("Failed");
            return Err(e);
        }
    };
    spinner.stop(&format!(
        "Got {} package(s) into {}",
        list.packages.len(),
        args.output_dir.display()
    ));

    for package in &list.failed {
        ui::step_error(&ctx, &format!("{} exists but failed to build", package));
    }
    for package in &list.missing {
        ui::step_warn(&ctx, &format!("no such package ({})", package));
    }

    if !list.failed.is_empty() || (!args.quiet && !list.missing.is_empty()) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn read_input(input: &Path) -> PoolResult<String> {
    if input == Path::new("-") {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .map_err(|e| PoolError::io("reading packages from stdin", e))?;
        return Ok(content);
    }
    fs::read_to_string(input)
        .map_err(|e| PoolError::io(format!("reading packages from {}", input.display()), e))
}

/// One package per line; `#` starts a comment
fn parse_package_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
