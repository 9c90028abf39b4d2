//! Per-star timing of a campaign.
//!
//! Downloading the spectra of one star takes from a second to several minutes depending
//! on the number of files and on the archive load. The campaign reports, for each star,
//! how long it took and a smoothed average:
//!
//! * [`StarTimer`] – Tracks per-star durations and an **exponential moving average**
//!   (`ema ← α·dt + (1–α)·ema`, `α ∈ (0,1]`). The first record initializes the average.
//! * [`fmt_dur`] – Human-readable [`Duration`]: `"253µs"`, `"42ms"`, `"3.14s"`, `"2m05s"`.
//! * [`campaign_bar`] – An `indicatif` bar over the star list, only with the
//!   `progress` feature.
use std::time::Duration;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

pub struct StarTimer {
    ema_ns: f64,
    alpha: f64,
    count: u64,
}

impl StarTimer {
    pub fn new(alpha: f64) -> Self {
        Self {
            ema_ns: 0.0,
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            count: 0,
        }
    }

    /// Account for one finished star that took `dt`.
    pub fn record(&mut self, dt: Duration) {
        self.count += 1;
        let dt_ns = dt.as_nanos() as f64;
        self.ema_ns = if self.count == 1 {
            dt_ns
        } else {
            self.alpha * dt_ns + (1.0 - self.alpha) * self.ema_ns
        };
    }

    #[inline]
    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.ema_ns as u64)
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

#[inline]
pub fn fmt_dur(d: Duration) -> String {
    let us = d.as_micros();
    if us < 1_000 {
        format!("{us}µs")
    } else if us < 1_000_000 {
        format!("{}ms", d.as_millis())
    } else if d.as_secs() < 60 {
        format!("{:.2}s", d.as_secs_f32())
    } else {
        let secs = d.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

/// Progress bar over `total` stars.
#[cfg(feature = "progress")]
pub fn campaign_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total.max(1));
    if let Ok(style) = ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | ETA {eta_precise} | {msg}",
    ) {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(200));
    pb
}

#[cfg(test)]
mod progress_bar_test {
    use super::*;

    #[test]
    fn test_fmt_dur() {
        assert_eq!(fmt_dur(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_dur(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_dur(Duration::from_millis(3140)), "3.14s");
        assert_eq!(fmt_dur(Duration::from_secs(125)), "2m05s");
    }

    #[test]
    fn test_ema() {
        let mut timer = StarTimer::new(0.5);
        assert_eq!(timer.avg(), Duration::ZERO);

        timer.record(Duration::from_secs(4));
        assert_eq!(timer.avg(), Duration::from_secs(4));

        timer.record(Duration::from_secs(2));
        assert_eq!(timer.avg(), Duration::from_secs(3));
        assert_eq!(timer.count(), 2);
    }
}
