//! Single-line progress display for long bulk runs.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

const BAR_WIDTH: usize = 30;
const RENDER_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub success: usize,
    pub failure: usize,
}

/// Counts completions and redraws one line in place (`\r`), at most once per
/// second plus once on reaching the total.
pub struct ProgressReporter<W: Write = Stdout> {
    label: String,
    counts: ProgressSnapshot,
    started_at: Instant,
    last_render: Option<Instant>,
    out: W,
}

impl ProgressReporter<Stdout> {
    pub fn new(total: usize, label: impl Into<String>) -> Self {
        Self::with_writer(total, label, io::stdout())
    }
}

impl<W: Write> ProgressReporter<W> {
    pub fn with_writer(total: usize, label: impl Into<String>, out: W) -> Self {
        Self {
            label: label.into(),
            counts: ProgressSnapshot {
                total,
                ..ProgressSnapshot::default()
            },
            started_at: Instant::now(),
            last_render: None,
            out,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.counts
    }

    /// Record one finished item. Updates beyond the total are ignored.
    pub fn update(&mut self, success: bool) {
        if self.counts.completed >= self.counts.total {
            debug!(label = %self.label, "Progress update past total ignored");
            return;
        }

        self.counts.completed += 1;
        if success {
            self.counts.success += 1;
        } else {
            self.counts.failure += 1;
        }

        let now = Instant::now();
        let due = self.counts.completed == self.counts.total
            || self
                .last_render
                .map_or(true, |at| now.duration_since(at) >= RENDER_INTERVAL);
        if due {
            self.render(now);
        }
    }

    /// Final redraw followed by a newline.
    pub fn complete(&mut self) {
        self.render(Instant::now());
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    pub fn percentage(&self) -> f64 {
        if self.counts.total == 0 {
            return 100.0;
        }
        self.counts.completed as f64 / self.counts.total as f64 * 100.0
    }

    /// Remaining time extrapolated from the average rate so far.
    pub fn eta(&self) -> Option<Duration> {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if self.counts.completed == 0 || elapsed <= 0.0 {
            return None;
        }
        let rate = self.counts.completed as f64 / elapsed;
        let remaining = self.counts.total.saturating_sub(self.counts.completed) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }

    pub fn render_line(&self) -> String {
        let pct = self.percentage();
        let filled = ((pct / 100.0 * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
        let eta = match self.eta() {
            Some(eta) => format!("{:.1}s", eta.as_secs_f64()),
            None => "calculating".to_string(),
        };
        format!(
            "{}: [{}{}] {:.1}% ({}/{}) ok:{} err:{} ETA: {}",
            self.label,
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            pct,
            self.counts.completed,
            self.counts.total,
            self.counts.success,
            self.counts.failure,
            eta
        )
    }

    fn render(&mut self, now: Instant) {
        self.last_render = Some(now);
        let line = self.render_line();
        let _ = write!(self.out, "\r{}", line);
        let _ = self.out.flush();
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
