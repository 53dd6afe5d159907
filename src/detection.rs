use std::collections::BTreeSet;

use chrono::NaiveTime;
use tracing::{debug, info, warn};

use crate::config::{AnomalyTimestamp, DetectionSettings, RateMode, RateSettings};
use crate::models::domain::{AnomalyEvent, AnomalyKind, Severity};
use crate::store::FinalizedStore;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Output of the post-pass. The two signals are independent: bursts are
/// volume based, SYN counts are flag based and never produce events.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub threshold: Option<f64>,
    pub bursts: Vec<AnomalyEvent>,
    pub syn_packets: usize,
    pub syn_sources: BTreeSet<String>,
    pub window_seconds: f64,
}

/// `total / distinct * multiplier`, or `None` when no source was seen.
pub fn burst_threshold(total_packets: usize, distinct_sources: usize, multiplier: f64) -> Option<f64> {
    if distinct_sources == 0 {
        return None;
    }
    Some(total_packets as f64 / distinct_sources as f64 * multiplier)
}

/// Normalization window in seconds. Fixed mode ignores the timestamps; measured
/// mode uses last minus first, wrapping once past midnight.
pub fn rate_window(store: &FinalizedStore, settings: &RateSettings) -> f64 {
    if settings.mode == RateMode::Fixed {
        return settings.window_seconds;
    }

    let span = match (
        store.first().and_then(|r| r.time()),
        store.last().and_then(|r| r.time()),
    ) {
        (Some(first), Some(last)) => elapsed_seconds(first, last),
        _ => 0.0,
    };

    if span > 0.0 {
        span
    } else {
        warn!(
            fallback = settings.window_seconds,
            "capture span is empty, using fixed rate window"
        );
        settings.window_seconds
    }
}

fn elapsed_seconds(first: NaiveTime, last: NaiveTime) -> f64 {
    let delta = (last - first).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0;
    if delta < 0.0 {
        delta + SECONDS_PER_DAY
    } else {
        delta
    }
}

pub struct AnomalyDetector<'a> {
    settings: &'a DetectionSettings,
    window_seconds: f64,
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(settings: &'a DetectionSettings, window_seconds: f64) -> Self {
        Self {
            settings,
            window_seconds,
        }
    }

    pub fn detect(&self, store: &FinalizedStore) -> Detection {
        let threshold = burst_threshold(
            store.total_packets(),
            store.distinct_sources(),
            self.settings.burst_multiplier,
        );

        let bursts = match threshold {
            Some(threshold) => self.detect_bursts(store, threshold),
            None => {
                warn!("no sources observed, skipping burst detection");
                Vec::new()
            }
        };
        let (syn_packets, syn_sources) = self.detect_syn(store);

        info!(
            threshold = ?threshold,
            bursts = bursts.len(),
            syn_packets,
            syn_sources = syn_sources.len(),
            "anomaly pass complete"
        );

        Detection {
            threshold,
            bursts,
            syn_packets,
            syn_sources,
            window_seconds: self.window_seconds,
        }
    }

    fn detect_bursts(&self, store: &FinalizedStore, threshold: f64) -> Vec<AnomalyEvent> {
        let mut flagged: Vec<(&String, usize)> = store
            .counts()
            .sources
            .iter()
            .filter(|&(_, &count)| count as f64 > threshold)
            .map(|(source, &count)| (source, count))
            .collect();
        flagged.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let capture_start = store
            .first()
            .map(|r| r.timestamp.clone())
            .unwrap_or_default();

        flagged
            .into_iter()
            .map(|(source, count)| {
                debug!(source = %source, count, threshold, "burst");
                let timestamp = match self.settings.anomaly_timestamp {
                    AnomalyTimestamp::CaptureStart => capture_start.clone(),
                    AnomalyTimestamp::FirstSeen => store
                        .records_from(source)
                        .next()
                        .map(|r| r.timestamp.clone())
                        .unwrap_or_else(|| capture_start.clone()),
                };
                AnomalyEvent {
                    timestamp,
                    source_address: source.clone(),
                    kind: AnomalyKind::Burst,
                    detail: format!(
                        "Traffic burst: {:.2} packets/s",
                        count as f64 / self.window_seconds
                    ),
                    severity: Severity::High,
                }
            })
            .collect()
    }

    fn detect_syn(&self, store: &FinalizedStore) -> (usize, BTreeSet<String>) {
        let mut packets = 0;
        let mut sources = BTreeSet::new();
        for record in store.records() {
            if record.has_marker(&self.settings.syn_marker) {
                packets += 1;
                sources.insert(record.source_key().to_string());
            }
        }
        (packets, sources)
    }
}
