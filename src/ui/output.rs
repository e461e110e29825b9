//! Status lines on stderr
//!
//! Command results are printed to stdout by the commands themselves; only
//! progress and diagnostics come through here.

use super::context::UiContext;
use console::{style, StyledObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    pub(super) fn marker(self, ctx: &UiContext) -> StyledObject<&'static str> {
        let (fancy, plain) = match self {
            Status::Ok => ("✓", "[OK]"),
            Status::Warn => ("!", "warning:"),
            Status::Fail => ("✗", "[FAIL]"),
            Status::Info => ("•", "[INFO]"),
        };
        let marker = style(if ctx.is_fancy() { fancy } else { plain }).for_stderr();
        match self {
            Status::Ok => marker.green(),
            Status::Warn => marker.yellow(),
            Status::Fail => marker.red(),
            Status::Info => marker.cyan(),
        }
    }

    pub(super) fn line(self, ctx: &UiContext, message: &str) -> String {
        format!("{} {}", self.marker(ctx), message)
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    eprintln!("{}", Status::Ok.line(ctx, message));
}

/// Print a warning, unless quiet
pub fn step_warn(ctx: &UiContext, message: &str) {
    if !ctx.is_quiet() {
        eprintln!("{}", Status::Warn.line(ctx, message));
    }
}

pub fn step_error(ctx: &UiContext, message: &str) {
    eprintln!("{}", Status::Fail.line(ctx, message));
}

pub fn step_info(ctx: &UiContext, message: &str) {
    eprintln!("{}", Status::Info.line(ctx, message));
}

/// Indented follow-up to the previous line
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.is_fancy() {
        eprintln!("  {}", style(message).dim());
    } else {
        eprintln!("  {}", message);
    }
}
