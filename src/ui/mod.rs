//! Terminal output for the command line
//!
//! Interactive terminals get symbols and a spinner. Pipes and CI get plain
//! markers such as `[OK]` and `warning:`.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{remark, step_error, step_info, step_ok, step_warn};
pub use progress::TaskSpinner;
