pub mod domain {
    use std::collections::HashMap;

    use chrono::NaiveTime;

    /// Which split pattern produced a record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LineShape {
        /// `src > dst: info`
        Ip,
        /// `family, what, info` (ARP, STP)
        Comma,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PacketRecord {
        pub timestamp: String,
        pub source: String,
        pub destination: String,
        pub protocol: Option<String>,
        pub info: String,
        // first and second dotted quads on the line, port stripped
        pub src_addr: Option<String>,
        pub dst_addr: Option<String>,
        pub length: Option<u32>,
        pub shape: LineShape,
    }

    impl PacketRecord {
        pub fn source_key(&self) -> &str {
            self.src_addr.as_deref().unwrap_or(&self.source)
        }

        pub fn destination_key(&self) -> &str {
            self.dst_addr.as_deref().unwrap_or(&self.destination)
        }

        pub fn time(&self) -> Option<NaiveTime> {
            NaiveTime::parse_from_str(&self.timestamp, "%H:%M:%S%.f").ok()
        }

        /// Last dot segment of the destination token, e.g. `https` in `10.0.0.2.https`.
        /// Comma-shaped destinations are free text and never name a service.
        pub fn service(&self) -> Option<&str> {
            if self.shape != LineShape::Ip || !self.destination.contains('.') {
                return None;
            }
            self.destination.rsplit('.').next()
        }

        pub fn has_marker(&self, marker: &str) -> bool {
            self.info.contains(marker)
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct AggregateCounts {
        pub protocols: HashMap<String, usize>,
        pub sources: HashMap<String, usize>,
        pub destinations: HashMap<String, usize>,
    }

    impl AggregateCounts {
        pub fn record(&mut self, record: &PacketRecord) {
            if let Some(proto) = &record.protocol {
                *self.protocols.entry(proto.clone()).or_insert(0) += 1;
            }
            *self.sources.entry(record.source_key().to_string()).or_insert(0) += 1;
            *self
                .destinations
                .entry(record.destination_key().to_string())
                .or_insert(0) += 1;
        }

        pub fn merge(&mut self, other: AggregateCounts) {
            for (key, count) in other.protocols {
                *self.protocols.entry(key).or_insert(0) += count;
            }
            for (key, count) in other.sources {
                *self.sources.entry(key).or_insert(0) += count;
            }
            for (key, count) in other.destinations {
                *self.destinations.entry(key).or_insert(0) += count;
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AnomalyKind {
        Burst,
    }

    impl AnomalyKind {
        pub fn as_str(&self) -> &'static str {
            match self {
                AnomalyKind::Burst => "burst",
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Severity {
        High,
    }

    impl Severity {
        pub fn as_str(&self) -> &'static str {
            match self {
                Severity::High => "high",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct AnomalyEvent {
        pub timestamp: String,
        pub source_address: String,
        pub kind: AnomalyKind,
        pub detail: String,
        pub severity: Severity,
    }
}

pub mod dto {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use super::domain::AnomalyEvent;
    use crate::error::Result;

    /// Snapshot handed to the chart/HTML/CSV generators.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct AnalysisResult {
        pub network_stats: NetworkStatsDTO,
        pub protocol_distribution: BTreeMap<String, usize>,
        pub detected_anomalies: Vec<AnomalyDTO>,
        pub traffic: TrafficSummaryDTO,
    }

    impl AnalysisResult {
        pub fn to_json(&self, pretty: bool) -> Result<String> {
            let text = if pretty {
                serde_json::to_string_pretty(self)?
            } else {
                serde_json::to_string(self)?
            };
            Ok(text)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct NetworkStatsDTO {
        pub packets_analyzed: usize,
        pub packets_rate: String,
        pub anomalies: CountDTO,
        pub suspicious_ips: CountDTO,
        pub services: CountDTO,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CountDTO {
        pub count: usize,
        pub percentage: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AnomalyDTO {
        pub timestamp: String,
        pub ip_source: String,
        #[serde(rename = "type")]
        pub kind: String,
        pub details: String,
        pub level: String,
    }

    impl From<&AnomalyEvent> for AnomalyDTO {
        fn from(event: &AnomalyEvent) -> Self {
            AnomalyDTO {
                timestamp: event.timestamp.clone(),
                ip_source: event.source_address.clone(),
                kind: event.kind.as_str().to_string(),
                details: event.detail.clone(),
                level: event.severity.as_str().to_string(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TrafficSummaryDTO {
        pub first_timestamp: Option<String>,
        pub last_timestamp: Option<String>,
        pub window_seconds: f64,
        pub top_sources: Vec<AddressCountDTO>,
        pub top_destinations: Vec<AddressCountDTO>,
        pub packet_sizes: PacketSizeDTO,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AddressCountDTO {
        pub address: String,
        pub packets: usize,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PacketSizeDTO {
        pub samples: usize,
        pub average_bytes: String,
    }
}
