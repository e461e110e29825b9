//! CLI argument definitions using clap derive

use crate::kernel::InfoQuery;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Pool - maintain a pool of Debian packages built on demand from stocks
///
/// A pool aggregates stocks (source trees, git branches, directories of
/// binary packages, other pools) and builds packages from them on demand.
#[derive(Parser, Debug)]
#[command(name = "pool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "POOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pool directory (default: current directory if it is a pool, else POOL_DIR)
    #[arg(short, long, global = true)]
    pub pool: Option<PathBuf>,

    /// Debug mode: keep failed build directories and log at debug level
    #[arg(
        short,
        long,
        global = true,
        env = "DEBUG",
        value_parser = FalseyValueParser::new()
    )]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new pool
    Init(InitArgs),

    /// Register a stock (a directory, a git branch, or another pool)
    Register(StockArgs),

    /// Unregister a stock
    Unregister(StockArgs),

    /// Check if a package exists in the pool
    Exists(PackageArgs),

    /// List packages in the pool
    List(ListArgs),

    /// Get packages from the pool, building them as needed
    Get(GetArgs),

    /// Print the path of a package, building it as needed
    Getpath(GetpathArgs),

    /// Resolve unversioned packages to their newest version
    Resolve(ResolveArgs),

    /// Garbage collect cached packages no stock references
    Gc(GcArgs),

    /// Print information about the pool
    Info(InfoArgs),

    /// Print the build log of a package
    InfoBuild(PackageArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Serve a pool kernel over stdin/stdout
    #[command(name = "__worker", hide = true)]
    Worker,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory packages are built in
    pub buildroot: PathBuf,
}

#[derive(Parser, Debug)]
pub struct StockArgs {
    /// Stock as /path/to/stock[#branch]
    pub stock: String,
}

#[derive(Parser, Debug)]
pub struct PackageArgs {
    /// Package as name[=version]
    pub package: String,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Print all available versions (default: newest only)
    #[arg(short, long, conflicts_with = "name_only")]
    pub all_versions: bool,

    /// Print only package names
    #[arg(short, long)]
    pub name_only: bool,

    /// Only list packages whose name matches one of these globs
    pub globs: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Also read packages from FILE, one per line (- for stdin)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Fail on missing packages
    #[arg(short, long)]
    pub strict: bool,

    /// Suppress warnings about missing packages
    #[arg(short, long)]
    pub quiet: bool,

    /// Lay out the output directory as a package tree
    #[arg(short, long)]
    pub tree: bool,

    /// Build source packages as well
    #[arg(short = 'o', long)]
    pub source: bool,

    /// Directory to put packages in
    pub output_dir: PathBuf,

    /// Packages as name[=version] (default: newest version of everything)
    pub packages: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct GetpathArgs {
    /// Package as name=version
    pub package: String,

    /// Only look in caches; never build
    #[arg(long)]
    pub no_build: bool,

    /// Build source packages as well
    #[arg(short = 'o', long)]
    pub source: bool,
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Packages as name[=version]
    #[arg(required = true)]
    pub packages: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct GcArgs {
    /// Do not collect subpools
    #[arg(short = 'R', long)]
    pub no_recursion: bool,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("query").multiple(false).args([
    "registered", "stocks", "subpools", "build_root",
    "build_logs", "pkgcache", "stock_sources", "stock_binaries",
])))]
pub struct InfoArgs {
    /// Registered stocks and subpools (default)
    #[arg(long)]
    pub registered: bool,

    /// Registered stocks
    #[arg(long)]
    pub stocks: bool,

    /// Registered subpools
    #[arg(long)]
    pub subpools: bool,

    /// Build root
    #[arg(long)]
    pub build_root: bool,

    /// Packages with a build log
    #[arg(long)]
    pub build_logs: bool,

    /// Cached binary packages
    #[arg(long)]
    pub pkgcache: bool,

    /// Source packages in each stock
    #[arg(long)]
    pub stock_sources: bool,

    /// Binary packages in each stock
    #[arg(long)]
    pub stock_binaries: bool,

    /// Also report on subpools
    #[arg(short, long)]
    pub recursive: bool,
}

impl InfoArgs {
    pub fn query(&self) -> InfoQuery {
        [
            (self.stocks, InfoQuery::Stocks),
            (self.subpools, InfoQuery::Subpools),
            (self.build_root, InfoQuery::BuildRoot),
            (self.build_logs, InfoQuery::BuildLogs),
            (self.pkgcache, InfoQuery::PkgCache),
            (self.stock_sources, InfoQuery::StockSources),
            (self.stock_binaries, InfoQuery::StockBinaries),
        ]
        .into_iter()
        .find_map(|(set, query)| set.then_some(query))
        .unwrap_or_default()
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., tools.builder)
        key: String,
        /// Value to set
        value: String,
    },
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
