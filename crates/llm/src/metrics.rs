//! Rolling performance metrics
//!
//! A bounded ring of recent requests. Appends happen under a short
//! critical section; reports aggregate overall, per-model and per-backend.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// One recorded request
#[derive(Debug, Clone, Serialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub backend: String,
    pub latency_seconds: f64,
    pub tokens: u32,
    pub tokens_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl MetricSample {
    pub fn new(model: &str, backend: &str, latency: Duration, tokens: u32) -> Self {
        let latency_seconds = latency.as_secs_f64();
        let tokens_per_second = if latency_seconds > 0.0 && tokens > 0 {
            tokens as f64 / latency_seconds
        } else {
            0.0
        };
        Self {
            timestamp: Utc::now(),
            model: model.to_string(),
            backend: backend.to_string(),
            latency_seconds,
            tokens,
            tokens_per_second,
            request_id: None,
            session_id: None,
            intent: None,
            stage: None,
        }
    }
}

/// Aggregate stats for one model or backend
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateStats {
    pub requests: usize,
    pub avg_latency_seconds: f64,
    pub avg_tokens_per_second: f64,
}

/// Full metrics report
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub avg_latency_seconds: f64,
    pub avg_tokens_per_second: f64,
    pub by_model: HashMap<String, AggregateStats>,
    pub by_backend: HashMap<String, AggregateStats>,
    pub window_size: usize,
}

/// Bounded ring of recent samples
pub struct MetricsWindow {
    samples: Mutex<VecDeque<MetricSample>>,
    window_size: usize,
}

impl MetricsWindow {
    pub fn new(window_size: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(window_size)),
            window_size,
        }
    }

    pub fn record(&self, sample: MetricSample) {
        let mut samples = self.samples.lock();
        if samples.len() == self.window_size {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub fn report(&self) -> MetricsReport {
        let samples = self.samples.lock();

        let total = samples.len();
        if total == 0 {
            return MetricsReport {
                total_requests: 0,
                avg_latency_seconds: 0.0,
                avg_tokens_per_second: 0.0,
                by_model: HashMap::new(),
                by_backend: HashMap::new(),
                window_size: self.window_size,
            };
        }

        fn aggregate<'a>(
            samples: impl Iterator<Item = &'a MetricSample>,
            key: impl Fn(&MetricSample) -> &str,
        ) -> HashMap<String, AggregateStats> {
            struct Acc {
                requests: usize,
                latency: f64,
                tps: f64,
                with_tokens: usize,
            }
            let mut by_key: HashMap<String, Acc> = HashMap::new();
            for s in samples {
                let acc = by_key.entry(key(s).to_string()).or_insert(Acc {
                    requests: 0,
                    latency: 0.0,
                    tps: 0.0,
                    with_tokens: 0,
                });
                acc.requests += 1;
                acc.latency += s.latency_seconds;
                if s.tokens_per_second > 0.0 {
                    acc.tps += s.tokens_per_second;
                    acc.with_tokens += 1;
                }
            }
            by_key
                .into_iter()
                .map(|(k, acc)| {
                    (
                        k,
                        AggregateStats {
                            requests: acc.requests,
                            avg_latency_seconds: acc.latency / acc.requests as f64,
                            avg_tokens_per_second: if acc.with_tokens > 0 {
                                acc.tps / acc.with_tokens as f64
                            } else {
                                0.0
                            },
                        },
                    )
                })
                .collect()
        }

        let total_latency: f64 = samples.iter().map(|s| s.latency_seconds).sum();
        let with_tokens: Vec<f64> = samples
            .iter()
            .filter(|s| s.tokens_per_second > 0.0)
            .map(|s| s.tokens_per_second)
            .collect();

        MetricsReport {
            total_requests: total,
            avg_latency_seconds: total_latency / total as f64,
            avg_tokens_per_second: if with_tokens.is_empty() {
                0.0
            } else {
                with_tokens.iter().sum::<f64>() / with_tokens.len() as f64
            },
            by_model: aggregate(samples.iter(), |s| &s.model),
            by_backend: aggregate(samples.iter(), |s| &s.backend),
            window_size: self.window_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_bounded() {
        let window = MetricsWindow::new(3);
        for i in 0..5 {
            window.record(MetricSample::new(
                &format!("model-{i}"),
                "ollama",
                Duration::from_millis(100),
                10,
            ));
        }
        let report = window.report();
        assert_eq!(report.total_requests, 3);
        // Oldest two were evicted
        assert!(!report.by_model.contains_key("model-0"));
        assert!(report.by_model.contains_key("model-4"));
    }

    #[test]
    fn test_aggregates() {
        let window = MetricsWindow::new(10);
        window.record(MetricSample::new("a", "ollama", Duration::from_secs(1), 100));
        window.record(MetricSample::new("a", "ollama", Duration::from_secs(3), 0));
        window.record(MetricSample::new("b", "openai", Duration::from_secs(2), 50));

        let report = window.report();
        assert_eq!(report.total_requests, 3);
        assert!((report.avg_latency_seconds - 2.0).abs() < 1e-9);
        // Only requests that produced tokens count toward tokens/sec
        assert!((report.avg_tokens_per_second - 62.5).abs() < 1e-9);

        let a = &report.by_model["a"];
        assert_eq!(a.requests, 2);
        assert!((a.avg_latency_seconds - 2.0).abs() < 1e-9);
        assert_eq!(report.by_backend["openai"].requests, 1);
    }

    #[test]
    fn test_empty_report() {
        let window = MetricsWindow::new(5);
        let report = window.report();
        assert_eq!(report.total_requests, 0);
        assert_eq!(report.avg_latency_seconds, 0.0);
    }
}
