//! Packet record store.
//!
//! Records are appended during the forward pass, then the store is frozen by
//! value. A `FinalizedStore` has no append, so writing after finalize does not
//! compile.

use std::collections::BTreeMap;

use multimap::MultiMap;

use crate::models::domain::{AggregateCounts, PacketRecord};
use crate::parser::{LineMatch, SkipReason};

#[derive(Debug, Default)]
pub struct PacketStore {
    records: Vec<PacketRecord>,
    counts: AggregateCounts,
    // source key -> indices into `records`
    by_source: MultiMap<String, usize>,
    skipped: BTreeMap<SkipReason, usize>,
}

impl PacketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: PacketRecord) {
        self.counts.record(&record);
        self.by_source
            .insert(record.source_key().to_string(), self.records.len());
        self.records.push(record);
    }

    pub fn note_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn ingest(&mut self, line: LineMatch) {
        match line {
            LineMatch::Matched(record) => self.append(record),
            LineMatch::Skipped(reason) => self.note_skip(reason),
        }
    }

    /// Appends a partial store built from a later chunk of the same capture.
    pub fn merge(&mut self, other: PacketStore) {
        let offset = self.records.len();
        for (source, indices) in other.by_source {
            for index in indices {
                self.by_source.insert(source.clone(), index + offset);
            }
        }
        self.records.extend(other.records);
        self.counts.merge(other.counts);
        for (reason, count) in other.skipped {
            *self.skipped.entry(reason).or_insert(0) += count;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub fn finalize(self) -> FinalizedStore {
        tracing::debug!(
            records = self.records.len(),
            sources = self.counts.sources.len(),
            skipped = ?self.skipped,
            "packet store finalized"
        );
        FinalizedStore {
            records: self.records,
            counts: self.counts,
            by_source: self.by_source,
            skipped: self.skipped,
        }
    }
}

#[derive(Debug)]
pub struct FinalizedStore {
    records: Vec<PacketRecord>,
    counts: AggregateCounts,
    by_source: MultiMap<String, usize>,
    skipped: BTreeMap<SkipReason, usize>,
}

impl FinalizedStore {
    pub fn records(&self) -> impl Iterator<Item = &PacketRecord> {
        self.records.iter()
    }

    pub fn counts(&self) -> &AggregateCounts {
        &self.counts
    }

    pub fn total_packets(&self) -> usize {
        self.records.len()
    }

    pub fn distinct_sources(&self) -> usize {
        self.counts.sources.len()
    }

    pub fn first(&self) -> Option<&PacketRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&PacketRecord> {
        self.records.last()
    }

    /// Records sent by `source`, in capture order.
    pub fn records_from<'a>(&'a self, source: &str) -> impl Iterator<Item = &'a PacketRecord> + 'a {
        self.by_source
            .get_vec(source)
            .map(|v| v.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&i| &self.records[i])
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::LineShape;

    fn record(ts: &str, src: &str, dst: &str, proto: &str) -> PacketRecord {
        PacketRecord {
            timestamp: ts.to_string(),
            source: format!("{}.1000", src),
            destination: format!("{}.80", dst),
            protocol: Some(proto.to_string()),
            info: String::new(),
            src_addr: Some(src.to_string()),
            dst_addr: Some(dst.to_string()),
            length: None,
            shape: LineShape::Ip,
        }
    }

    #[test]
    fn append_updates_counts() {
        let mut store = PacketStore::new();
        store.append(record("10:00:00.000001", "10.0.0.1", "10.0.0.9", "http"));
        store.append(record("10:00:00.000002", "10.0.0.1", "10.0.0.8", "http"));
        store.append(record("10:00:00.000003", "10.0.0.2", "10.0.0.9", "domain"));
        let store = store.finalize();

        assert_eq!(store.total_packets(), 3);
        assert_eq!(store.distinct_sources(), 2);
        assert_eq!(store.counts().sources["10.0.0.1"], 2);
        assert_eq!(store.counts().destinations["10.0.0.9"], 2);
        assert_eq!(store.counts().protocols["http"], 2);
        assert_eq!(store.first().unwrap().timestamp, "10:00:00.000001");
        assert_eq!(store.last().unwrap().timestamp, "10:00:00.000003");
    }

    #[test]
    fn records_from_keeps_capture_order() {
        let mut store = PacketStore::new();
        store.append(record("10:00:00.000001", "10.0.0.2", "10.0.0.9", "http"));
        store.append(record("10:00:00.000002", "10.0.0.1", "10.0.0.9", "http"));
        store.append(record("10:00:00.000003", "10.0.0.1", "10.0.0.9", "http"));
        let store = store.finalize();

        let stamps: Vec<_> = store
            .records_from("10.0.0.1")
            .map(|r| r.timestamp.as_str())
            .collect();
        assert_eq!(stamps, vec!["10:00:00.000002", "10:00:00.000003"]);
        assert_eq!(store.records_from("10.9.9.9").count(), 0);
    }

    #[test]
    fn merge_matches_sequential_append() {
        let recs = vec![
            record("10:00:00.000001", "10.0.0.1", "10.0.0.9", "http"),
            record("10:00:00.000002", "10.0.0.2", "10.0.0.9", "domain"),
            record("10:00:00.000003", "10.0.0.1", "10.0.0.8", "http"),
            record("10:00:00.000004", "10.0.0.3", "10.0.0.8", "ssh"),
        ];

        let mut sequential = PacketStore::new();
        for r in recs.clone() {
            sequential.append(r);
        }
        sequential.note_skip(SkipReason::Continuation);

        let mut head = PacketStore::new();
        let mut tail = PacketStore::new();
        head.append(recs[0].clone());
        head.append(recs[1].clone());
        tail.append(recs[2].clone());
        tail.append(recs[3].clone());
        tail.note_skip(SkipReason::Continuation);
        head.merge(tail);

        let (a, b) = (sequential.finalize(), head.finalize());
        assert_eq!(a.counts(), b.counts());
        assert_eq!(a.records().collect::<Vec<_>>(), b.records().collect::<Vec<_>>());
        assert_eq!(
            b.records_from("10.0.0.1").map(|r| r.timestamp.clone()).collect::<Vec<_>>(),
            vec!["10:00:00.000001", "10:00:00.000003"]
        );
        assert_eq!(b.skipped(SkipReason::Continuation), 1);
        assert_eq!(b.total_skipped(), 1);
    }
}
