//! Progress accounting and human-readable formatting.
//!
//! The distributor publishes a [`ProgressSnapshot`] to a [`ProgressObserver`]
//! from its control thread; the binary renders them with `indicatif`.
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Candidates of the current space known to be tried, including earlier
    /// runs restored from a checkpoint.
    pub done: u64,
    pub total: u64,
    /// Candidates tried by this run only.
    pub tried: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Candidates per second over this run.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.tried as f64 / secs
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.done as f64 / self.total as f64 * 100.0
    }

    pub fn eta(&self) -> Option<Duration> {
        estimate_remaining(self.done, self.total, self.rate())
    }
}

pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _label: &str, _total: u64, _done: u64) {}

    fn on_progress(&self, snapshot: &ProgressSnapshot);

    fn on_finish(&self, _snapshot: &ProgressSnapshot) {}
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressObserver for Silent {
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
}

/// One-line live status: label, share done, throughput and ETA.
pub fn status_line(label: &str, snapshot: &ProgressSnapshot) -> String {
    let eta = snapshot
        .eta()
        .map(format_duration)
        .unwrap_or_else(|| "--".to_string());
    format!(
        "{label} {} | {} | ETA {eta}",
        pct(snapshot.done, snapshot.total),
        format_rate(snapshot.rate())
    )
}

/// Terminal progress bar, one per space.
#[derive(Default)]
pub struct BarObserver {
    bar: Mutex<Option<(ProgressBar, String)>>,
}

impl BarObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

impl ProgressObserver for BarObserver {
    fn on_start(&self, label: &str, total: u64, done: u64) {
        let pb = ProgressBar::new(total);
        pb.set_style(Self::style());
        pb.set_position(done);
        pb.set_message(label.to_string());
        if let Ok(mut slot) = self.bar.lock() {
            if let Some((old, _)) = slot.replace((pb, label.to_string())) {
                old.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        if let Ok(slot) = self.bar.lock() {
            if let Some((pb, label)) = slot.as_ref() {
                pb.set_position(snapshot.done);
                pb.set_message(status_line(label, snapshot));
            }
        }
    }

    fn on_finish(&self, snapshot: &ProgressSnapshot) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some((pb, label)) = slot.take() {
                pb.set_position(snapshot.done);
                pb.finish_with_message(format!(
                    "{label} {} tried at {}",
                    format_number(snapshot.tried),
                    format_rate(snapshot.rate())
                ));
            }
        }
    }
}

pub fn estimate_remaining(done: u64, total: u64, rate: f64) -> Option<Duration> {
    if rate <= 0.0 || done >= total {
        return None;
    }
    Duration::try_from_secs_f64((total - done) as f64 / rate).ok()
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

/// `1234567` becomes `1,234,567`.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_rate(rate: f64) -> String {
    if rate >= 1_000_000.0 {
        format!("{:.1}M/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}K/s", rate / 1_000.0)
    } else {
        format!("{rate:.0}/s")
    }
}

pub fn pct(n: u64, d: u64) -> String {
    if d == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", (n as f64) / (d as f64) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_arithmetic() {
        let s = ProgressSnapshot {
            done: 500,
            total: 1000,
            tried: 100,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(s.rate(), 50.0);
        assert_eq!(s.percent(), 50.0);
        assert_eq!(s.eta(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn no_eta_without_rate_or_when_done() {
        assert_eq!(estimate_remaining(0, 10, 0.0), None);
        assert_eq!(estimate_remaining(10, 10, 5.0), None);
    }

    #[test]
    fn status_line_shows_share_rate_and_eta() {
        let s = ProgressSnapshot {
            done: 250,
            total: 1000,
            tried: 250,
            elapsed: Duration::from_secs(5),
        };
        assert_eq!(
            status_line("FixedLengthDigits(len=3)", &s),
            "FixedLengthDigits(len=3) 25.00% | 50/s | ETA 15s"
        );
        let stalled = ProgressSnapshot {
            tried: 0,
            done: 0,
            ..s
        };
        assert!(status_line("x", &stalled).ends_with("| 0/s | ETA --"));
    }

    #[test]
    fn bar_observer_survives_a_full_lifecycle() {
        let bar = BarObserver::new();
        let s = ProgressSnapshot {
            done: 5,
            total: 10,
            tried: 5,
            elapsed: Duration::from_millis(10),
        };
        bar.on_progress(&s);
        bar.on_start("digits", 10, 0);
        bar.on_progress(&s);
        bar.on_finish(&s);
        assert!(bar.bar.lock().unwrap().is_none());
    }

    #[test]
    fn absurd_eta_is_omitted() {
        assert_eq!(estimate_remaining(0, u64::MAX, 1e-12), None);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_rate(12.4), "12/s");
        assert_eq!(format_rate(2_500.0), "2.5K/s");
        assert_eq!(format_rate(3_000_000.0), "3.0M/s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(pct(1, 3), "33.33%");
        assert_eq!(pct(1, 0), "0.00%");
    }
}
