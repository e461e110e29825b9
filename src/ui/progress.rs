//! Spinner shown while packages are built

use super::context::UiContext;
use super::output::Status;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// One spinner on stderr; a plain `...` line outside a terminal
pub struct TaskSpinner {
    ctx: UiContext,
    bar: Option<ProgressBar>,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self { ctx: *ctx, bar: None }
    }

    pub fn start(&mut self, message: &str) {
        self.finish();
        if !self.ctx.is_fancy() {
            eprintln!("{} {}", style("...").dim(), message);
            return;
        }
        let bar = ProgressBar::new_spinner();
        let template = "{spinner:.cyan} {msg} {elapsed:.dim}";
        if let Ok(spinner) = ProgressStyle::default_spinner().template(template) {
            bar.set_style(spinner);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(bar);
    }

    pub fn stop(&mut self, message: &str) {
        self.finish();
        eprintln!("{}", Status::Ok.line(&self.ctx, message));
    }

    pub fn stop_error(&mut self, message: &str) {
        self.finish();
        eprintln!("{}", Status::Fail.line(&self.ctx, message));
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for TaskSpinner {
    fn drop(&mut self) {
        self.finish();
    }
}
