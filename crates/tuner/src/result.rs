//! Tuning results and the end-of-run summary.

use serde::{Deserialize, Serialize};
use tuneforge_space::Configuration;

/// Outcome of one measured candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Verified against the reference (or no reference was configured).
    Ok,
    /// Ran and was timed, but its output differs from the reference.
    Mismatch,
    /// Could not be measured; the stored time is the `+∞` sentinel.
    Failed,
}

/// One row of the tuning log: a configuration and what it measured.
#[derive(Debug, Clone, Serialize)]
pub struct TuningResult {
    pub kernel: String,
    pub configuration: Configuration,
    /// Minimum device time over the configured repeats, in milliseconds;
    /// `+∞` for failed candidates.
    pub time_ms: f64,
    /// Work-items per group of the launch.
    pub threads: usize,
    pub status: RunStatus,
}

impl TuningResult {
    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}

/// Best verified result and fastest overall row, reported separately: the
/// fastest row may be a `Mismatch`.
#[derive(Debug, Clone, Default)]
pub struct TuningSummary {
    pub best_ok: Option<TuningResult>,
    pub fastest: Option<TuningResult>,
}

pub(crate) fn summarize(results: &[TuningResult]) -> TuningSummary {
    let mut summary = TuningSummary::default();
    for result in results {
        if !result.time_ms.is_finite() {
            continue;
        }
        if result.is_ok()
            && summary
                .best_ok
                .as_ref()
                .map_or(true, |best| result.time_ms < best.time_ms)
        {
            summary.best_ok = Some(result.clone());
        }
        if summary
            .fastest
            .as_ref()
            .map_or(true, |fastest| result.time_ms < fastest.time_ms)
        {
            summary.fastest = Some(result.clone());
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(time_ms: f64, status: RunStatus) -> TuningResult {
        TuningResult {
            kernel: "k".into(),
            configuration: Configuration::empty(),
            time_ms,
            threads: 64,
            status,
        }
    }

    #[test]
    fn test_summary_separates_best_ok_from_fastest() {
        let results = vec![
            row(4.0, RunStatus::Ok),
            row(2.0, RunStatus::Mismatch),
            row(f64::INFINITY, RunStatus::Failed),
            row(3.0, RunStatus::Ok),
        ];
        let summary = summarize(&results);
        assert_eq!(summary.best_ok.unwrap().time_ms, 3.0);
        let fastest = summary.fastest.unwrap();
        assert_eq!(fastest.time_ms, 2.0);
        assert_eq!(fastest.status, RunStatus::Mismatch);
    }

    #[test]
    fn test_all_failed_yields_empty_summary() {
        let results = vec![row(f64::INFINITY, RunStatus::Failed)];
        let summary = summarize(&results);
        assert!(summary.best_ok.is_none());
        assert!(summary.fastest.is_none());
    }
}
