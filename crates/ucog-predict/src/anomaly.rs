//! Compression ratio as a drift and novelty signal.
//!
//! The dedup ratio is a free anomaly signal: when it drops sharply the
//! input looks like nothing the store has learned, and when it spikes the
//! input is suspiciously repetitive (a loop, or an attack). The detector
//! keeps a sliding window of recent ratios and flags observations whose
//! z-score leaves the configured band.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use ucog_core::{AnomalyConfig, AuditKind, AuditSink};

/// Compression ratio of a payload; a zero compressed size counts as 1.
pub fn compression_ratio(original_size: usize, compressed_size: usize) -> f64 {
    original_size as f64 / compressed_size.max(1) as f64
}

/// Alert severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// An anomaly detected in the compression-ratio time series.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub ratio: f64,
    pub z_score: f64,
    pub mean: f64,
    pub std: f64,
    pub severity: Severity,
}

impl fmt::Display for AnomalyAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ratio={:.1}x (z={:+.2}, mean={:.1}x, std={:.2}) @ {}",
            self.severity.as_str().to_uppercase(),
            self.ratio,
            self.z_score,
            self.mean,
            self.std,
            self.label
        )
    }
}

/// Summary of drift over the current window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriftReport {
    /// Observations currently in the window.
    pub window_size: usize,
    pub current_mean: f64,
    pub current_std: f64,
    /// Mean of the second half minus mean of the first half; positive
    /// means compression is improving.
    pub trend: f64,
    pub alerts_count: usize,
    pub is_drifting: bool,
}

/// Sliding z-score detector over compression ratios.
pub struct AnomalyDetector {
    config: AnomalyConfig,
    history: VecDeque<f64>,
    alerts: Vec<AnomalyAlert>,
    observations: u64,
    audit: Option<Arc<dyn AuditSink>>,
}

impl AnomalyDetector {
    /// Create a detector with the given configuration.
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            history: VecDeque::with_capacity(config.window),
            alerts: Vec::new(),
            observations: 0,
            audit: None,
        }
    }

    /// Attach an audit sink notified on every alert.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Record an observation and check for an anomaly.
    pub fn observe(&mut self, ratio: f64, label: &str) -> Option<AnomalyAlert> {
        self.observations += 1;

        // Too little history for meaningful statistics.
        if self.history.len() < 5 {
            self.push(ratio);
            return None;
        }

        let mean = self.mean();
        let std = self.std(mean).max(self.config.min_std);
        let z_score = (ratio - mean) / std;

        let severity = if z_score < self.config.z_low {
            Some(if z_score < self.config.z_low * 1.5 {
                Severity::High
            } else {
                Severity::Medium
            })
        } else if z_score > self.config.z_high {
            Some(if z_score > self.config.z_high * 1.5 {
                Severity::Medium
            } else {
                Severity::Low
            })
        } else {
            None
        };

        let alert = severity.map(|severity| AnomalyAlert {
            timestamp: Utc::now(),
            label: label.to_string(),
            ratio,
            z_score,
            mean,
            std,
            severity,
        });

        if let Some(alert) = &alert {
            tracing::warn!(%alert, "compression ratio anomaly");
            if let Some(sink) = &self.audit {
                sink.on_event(AuditKind::AnomalyAlert, label, &alert.to_string());
            }
            self.alerts.push(alert.clone());
        }

        self.push(ratio);
        alert
    }

    /// Summarise the drift state of the current window.
    ///
    /// The trend is judged against the spread of the baseline (first)
    /// half of the window, falling back to an absolute 0.5 threshold
    /// when that spread is zero.
    pub fn drift_report(&self) -> DriftReport {
        if self.history.len() < 2 {
            return DriftReport {
                window_size: self.history.len(),
                current_mean: self.mean(),
                current_std: 0.0,
                trend: 0.0,
                alerts_count: self.alerts.len(),
                is_drifting: false,
            };
        }

        let mean = self.mean();
        let std = self.std(mean);

        let values: Vec<f64> = self.history.iter().copied().collect();
        let half = values.len() / 2;
        let first = &values[..half];
        let second = &values[half..];
        let first_mean = first.iter().sum::<f64>() / first.len().max(1) as f64;
        let second_mean = second.iter().sum::<f64>() / second.len().max(1) as f64;
        let trend = second_mean - first_mean;

        let baseline_var = first
            .iter()
            .map(|x| (x - first_mean) * (x - first_mean))
            .sum::<f64>()
            / first.len().max(1) as f64;
        let baseline_std = baseline_var.sqrt();
        let is_drifting = if baseline_std > 0.0 {
            trend.abs() > baseline_std
        } else {
            trend.abs() > 0.5
        };

        DriftReport {
            window_size: self.history.len(),
            current_mean: mean,
            current_std: std,
            trend,
            alerts_count: self.alerts.len(),
            is_drifting,
        }
    }

    /// All alerts emitted so far.
    pub fn alerts(&self) -> &[AnomalyAlert] {
        &self.alerts
    }

    /// Total observations fed in, including warmup.
    pub fn observation_count(&self) -> u64 {
        self.observations
    }

    /// Clear the window, alerts, and counters.
    pub fn reset(&mut self) {
        self.history.clear();
        self.alerts.clear();
        self.observations = 0;
    }

    fn push(&mut self, ratio: f64) {
        if self.history.len() == self.config.window {
            self.history.pop_front();
        }
        self.history.push_back(ratio);
    }

    fn mean(&self) -> f64 {
        self.history.iter().sum::<f64>() / self.history.len().max(1) as f64
    }

    fn std(&self, mean: f64) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let variance = self
            .history
            .iter()
            .map(|x| (x - mean) * (x - mean))
            .sum::<f64>()
            / self.history.len() as f64;
        variance.sqrt()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_ratio() {
        assert_eq!(compression_ratio(1000, 100), 10.0);
        assert_eq!(compression_ratio(1000, 0), 1000.0);
        assert_eq!(compression_ratio(0, 0), 0.0);
    }

    #[test]
    fn test_warmup_never_alerts() {
        let mut detector = AnomalyDetector::default();
        for i in 0..5 {
            assert!(detector.observe(100.0 * i as f64, "warmup").is_none());
        }
        assert_eq!(detector.observation_count(), 5);
    }

    #[test]
    fn test_low_ratio_alert_on_novelty() {
        let mut detector = AnomalyDetector::default();
        for i in 0..25 {
            detector.observe(20.0, &format!("session-{i}"));
        }
        let alert = detector.observe(1.0, "novel-session").unwrap();
        assert!(alert.severity >= Severity::Medium);
        assert!(alert.z_score < -2.0);
        assert_eq!(detector.alerts().len(), 1);
        assert!(detector.drift_report().is_drifting);
    }

    #[test]
    fn test_high_ratio_alert_on_duplication() {
        let mut detector = AnomalyDetector::default();
        for i in 0..20 {
            detector.observe(5.0 + (i % 3) as f64, "steady");
        }
        let alert = detector.observe(500.0, "loop");
        assert!(alert.is_some());
        assert!(alert.unwrap().z_score > 3.0);
    }

    #[test]
    fn test_steady_stream_no_alerts() {
        let mut detector = AnomalyDetector::default();
        for i in 0..40 {
            detector.observe(10.0 + (i % 5) as f64 * 0.1, "steady");
        }
        assert!(detector.alerts().is_empty());
        assert!(!detector.drift_report().is_drifting);
    }

    #[test]
    fn test_window_bounded() {
        let mut detector = AnomalyDetector::default();
        for _ in 0..200 {
            detector.observe(10.0, "fill");
        }
        assert_eq!(detector.drift_report().window_size, 50);
    }

    #[test]
    fn test_reset() {
        let mut detector = AnomalyDetector::default();
        for _ in 0..10 {
            detector.observe(10.0, "x");
        }
        detector.reset();
        assert_eq!(detector.observation_count(), 0);
        assert_eq!(detector.drift_report().window_size, 0);
    }
}
