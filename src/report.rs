use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::ReportSettings;
use crate::detection::Detection;
use crate::models::dto::{
    AddressCountDTO, AnalysisResult, AnomalyDTO, CountDTO, NetworkStatsDTO, PacketSizeDTO,
    TrafficSummaryDTO,
};
use crate::store::FinalizedStore;

/// Builds the snapshot. Pure: same store and detection, same result.
pub fn build_result(
    store: &FinalizedStore,
    detection: &Detection,
    settings: &ReportSettings,
) -> AnalysisResult {
    let total = store.total_packets();
    let counts = store.counts();

    let services: BTreeSet<&str> = store.records().filter_map(|r| r.service()).collect();

    let network_stats = NetworkStatsDTO {
        packets_analyzed: total,
        packets_rate: format!("{:.1}/s", total as f64 / detection.window_seconds),
        anomalies: CountDTO {
            count: detection.syn_packets,
            percentage: percentage(detection.syn_packets, total),
        },
        suspicious_ips: CountDTO {
            count: detection.syn_sources.len(),
            percentage: percentage(detection.syn_sources.len(), store.distinct_sources()),
        },
        services: CountDTO {
            count: services.len(),
            percentage: "-".to_string(),
        },
    };

    let protocol_distribution: BTreeMap<String, usize> = counts
        .protocols
        .iter()
        .map(|(proto, &count)| (proto.clone(), count))
        .collect();

    let lengths: Vec<u32> = store.records().filter_map(|r| r.length).collect();
    let average_bytes = if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().map(|&l| l as f64).sum::<f64>() / lengths.len() as f64
    };

    let traffic = TrafficSummaryDTO {
        first_timestamp: store.first().map(|r| r.timestamp.clone()),
        last_timestamp: store.last().map(|r| r.timestamp.clone()),
        window_seconds: detection.window_seconds,
        top_sources: top_n(&counts.sources, settings.top_n),
        top_destinations: top_n(&counts.destinations, settings.top_n),
        packet_sizes: PacketSizeDTO {
            samples: lengths.len(),
            average_bytes: format!("{:.2}", average_bytes),
        },
    };

    AnalysisResult {
        network_stats,
        protocol_distribution,
        detected_anomalies: detection.bursts.iter().map(AnomalyDTO::from).collect(),
        traffic,
    }
}

fn percentage(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", part as f64 / whole as f64 * 100.0)
}

fn top_n(counts: &HashMap<String, usize>, n: usize) -> Vec<AddressCountDTO> {
    let mut ranked: Vec<(&String, usize)> = counts.iter().map(|(k, &v)| (k, v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(n)
        .map(|(address, packets)| AddressCountDTO {
            address: address.clone(),
            packets,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionSettings;
    use crate::detection::AnomalyDetector;
    use crate::models::domain::{LineShape, PacketRecord};
    use crate::store::PacketStore;

    fn record(src: &str, dst: &str, info: &str, length: Option<u32>) -> PacketRecord {
        PacketRecord {
            timestamp: "09:00:00.000000".to_string(),
            source: format!("{}.40000", src),
            destination: dst.to_string(),
            protocol: dst.rsplit('.').next().map(str::to_string),
            info: info.to_string(),
            src_addr: Some(src.to_string()),
            dst_addr: None,
            length,
            shape: LineShape::Ip,
        }
    }

    fn analyze(store: &FinalizedStore) -> AnalysisResult {
        let detection = AnomalyDetector::new(&DetectionSettings::default(), 60.0).detect(store);
        build_result(store, &detection, &ReportSettings::default())
    }

    #[test]
    fn summary_fields() {
        let mut store = PacketStore::new();
        store.append(record("10.0.0.1", "10.0.0.9.https", "Flags [S], length 0", Some(0)));
        store.append(record("10.0.0.1", "10.0.0.9.https", "Flags [.], length 100", Some(100)));
        store.append(record("10.0.0.2", "10.0.0.9.domain", "4242+ A? x. (29)", None));
        store.append(record("10.0.0.3", "10.0.0.8.https", "Flags [P.], length 50", Some(50)));
        let result = analyze(&store.finalize());

        let stats = &result.network_stats;
        assert_eq!(stats.packets_analyzed, 4);
        assert_eq!(stats.packets_rate, "0.1/s");
        assert_eq!(stats.anomalies.count, 1);
        assert_eq!(stats.anomalies.percentage, "25.0%");
        assert_eq!(stats.suspicious_ips.count, 1);
        assert_eq!(stats.suspicious_ips.percentage, "33.3%");
        assert_eq!(stats.services.count, 2);
        assert_eq!(stats.services.percentage, "-");

        assert_eq!(result.protocol_distribution["https"], 3);
        assert_eq!(result.protocol_distribution["domain"], 1);
        assert_eq!(result.traffic.top_sources[0].address, "10.0.0.1");
        assert_eq!(result.traffic.top_sources[0].packets, 2);
        assert_eq!(result.traffic.packet_sizes.samples, 3);
        assert_eq!(result.traffic.packet_sizes.average_bytes, "50.00");
    }

    #[test]
    fn empty_store_yields_zero_filled_result() {
        let result = analyze(&PacketStore::new().finalize());
        let stats = &result.network_stats;
        assert_eq!(stats.packets_analyzed, 0);
        assert_eq!(stats.packets_rate, "0.0/s");
        assert_eq!(stats.anomalies.percentage, "0.0%");
        assert_eq!(stats.suspicious_ips.percentage, "0.0%");
        assert!(result.protocol_distribution.is_empty());
        assert!(result.detected_anomalies.is_empty());
        assert_eq!(result.traffic.first_timestamp, None);
        assert_eq!(result.traffic.packet_sizes.average_bytes, "0.00");
    }

    #[test]
    fn building_twice_is_identical() {
        let mut store = PacketStore::new();
        for i in 0..30 {
            let src = format!("10.0.0.{}", i % 7);
            store.append(record(&src, &format!("10.0.1.{}.https", i % 3), "Flags [S]", Some(i)));
        }
        for _ in 0..40 {
            store.append(record("10.0.0.99", "10.0.1.1.ssh", "Flags [.]", None));
        }
        let store = store.finalize();
        let detection = AnomalyDetector::new(&DetectionSettings::default(), 60.0).detect(&store);
        let a = build_result(&store, &detection, &ReportSettings::default());
        let b = build_result(&store, &detection, &ReportSettings::default());
        assert_eq!(a.to_json(true).unwrap(), b.to_json(true).unwrap());
        assert_eq!(a.detected_anomalies.len(), 1);
        assert_eq!(a.detected_anomalies[0].ip_source, "10.0.0.99");
    }

    #[test]
    fn top_n_is_truncated_and_ordered() {
        let counts: HashMap<String, usize> = [("b", 3), ("a", 3), ("c", 5), ("d", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let top = top_n(&counts, 3);
        let names: Vec<_> = top.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
