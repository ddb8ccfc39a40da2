use indicatif::{ProgressBar, ProgressStyle};

const TRANSFER_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Receives byte counts from sync transfers.
pub trait ProgressReporter: Send + Sync {
    fn start(&self, total: u64);
    fn update(&self, current: u64);
    fn finish(&self);
}

/// Indicatif-based progress reporter
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// A transfer bar labelled with `name`; the length is set by `start`.
    pub fn transfer(name: &str) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(TRANSFER_TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(name.to_string());
        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn update(&self, current: u64) {
        if self.bar.length().unwrap_or(0) < current {
            self.bar.set_length(current);
        }
        self.bar.set_position(current);
    }

    fn finish(&self) {
        self.bar.finish_with_message("Complete");
    }
}

/// No-op progress reporter for when progress reporting is disabled
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    fn start(&self, _total: u64) {}
    fn update(&self, _current: u64) {}
    fn finish(&self) {}
}
