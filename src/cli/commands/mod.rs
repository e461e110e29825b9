//! CLI command implementations

pub mod completions;
pub mod config;
pub mod exists;
pub mod gc;
pub mod get;
pub mod getpath;
pub mod info;
pub mod init;
pub mod list;
pub mod resolve;
pub mod stock;

pub use completions::execute as completions;
pub use config::execute as config;
pub use exists::execute as exists;
pub use gc::execute as gc;
pub use get::execute as get;
pub use getpath::execute as getpath;
pub use info::{execute as info, info_build};
pub use init::execute as init;
pub use list::execute as list;
pub use resolve::execute as resolve;
pub use stock::{register, unregister};
