//! Spinner display for long-running commands.
//!
//! Log lines printed while a spinner is ticking go through [`Spinner::println`]
//! so the spinner line is cleared and redrawn underneath them.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICK: Duration = Duration::from_millis(100);

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    /// Start a ticking spinner. When `quiet` is true it is hidden.
    pub fn start(quiet: bool, msg: impl Into<String>) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("  {spinner:.cyan} {msg}")
                    .expect("static pattern")
                    .tick_chars("/-\\|"),
            );
            pb.enable_steady_tick(TICK);
            pb
        };
        pb.set_message(msg.into());
        Self { pb }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.pb.set_message(msg.into());
    }

    /// Run `f` (typically a `log::` call) with the spinner line hidden.
    pub fn println(&self, f: impl FnOnce()) {
        self.pb.suspend(f);
    }

    /// Stop ticking and clear the spinner line.
    pub fn clear(&self) {
        self.pb.disable_steady_tick();
        self.pb.finish_and_clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}
