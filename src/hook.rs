//! Observability hook for intermediate tensor distributions.
//!
//! The composite model reports `node_info`, `node_info_propagated` and
//! `output_log_probs` to an optional `HistogramHook`. Histogram backends
//! live outside the crate; `SummaryHook` keeps summary statistics and
//! logs them through `tracing`.

use statrs::statistics::{Data, Distribution, Max, Median, Min};
use tracing::debug;

/// Receiver of named value distributions.
pub trait HistogramHook {
    fn add_histogram(&mut self, name: &str, values: &[f32]);
}

/// Hook that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl HistogramHook for NoopHook {
    fn add_histogram(&mut self, _name: &str, _values: &[f32]) {}
}

/// Summary statistics of one reported distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation; `None` for fewer than two values.
    pub std_dev: Option<f64>,
    pub median: f64,
}

impl HistogramSummary {
    /// Summarize `values`; `None` when empty.
    pub fn from_values(values: &[f32]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let data = Data::new(values.iter().map(|&v| f64::from(v)).collect::<Vec<f64>>());
        let std_dev = if values.len() > 1 {
            data.std_dev()
        } else {
            None
        };
        Some(HistogramSummary {
            count: values.len(),
            min: data.min(),
            max: data.max(),
            mean: data.mean()?,
            std_dev,
            median: data.median(),
        })
    }
}

/// Hook that records a `HistogramSummary` per report.
#[derive(Debug, Clone, Default)]
pub struct SummaryHook {
    summaries: Vec<(String, HistogramSummary)>,
}

impl SummaryHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded summary, in report order.
    pub fn summaries(&self) -> &[(String, HistogramSummary)] {
        &self.summaries
    }

    /// Most recent summary reported under `name`.
    pub fn latest(&self, name: &str) -> Option<&HistogramSummary> {
        self.summaries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }
}

impl HistogramHook for SummaryHook {
    fn add_histogram(&mut self, name: &str, values: &[f32]) {
        let Some(summary) = HistogramSummary::from_values(values) else {
            return;
        };
        debug!(
            name,
            count = summary.count,
            min = summary.min,
            max = summary.max,
            mean = summary.mean,
            "histogram"
        );
        self.summaries.push((name.to_string(), summary));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_statistics() {
        let s = HistogramSummary::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.median - 2.5).abs() < 1e-12);
        let expected_sd = (5.0f64 / 3.0).sqrt();
        assert!((s.std_dev.unwrap() - expected_sd).abs() < 1e-9);
    }

    #[test]
    fn empty_and_single_values() {
        assert!(HistogramSummary::from_values(&[]).is_none());
        let s = HistogramSummary::from_values(&[7.0]).unwrap();
        assert_eq!(s.std_dev, None);
        assert_eq!(s.median, 7.0);
    }

    #[test]
    fn summary_hook_keeps_latest_per_name() {
        let mut hook = SummaryHook::new();
        hook.add_histogram("a", &[1.0]);
        hook.add_histogram("b", &[]);
        hook.add_histogram("a", &[3.0, 5.0]);
        assert_eq!(hook.summaries().len(), 2);
        assert_eq!(hook.latest("a").unwrap().mean, 4.0);
        assert!(hook.latest("b").is_none());
    }
}
