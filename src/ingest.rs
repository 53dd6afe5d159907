//! Capture ingestion and the analysis pipeline.
//!
//! Two phases, always: every line is extracted into a store first, the
//! threshold and rates are only computed once the store is finalized.

use std::fs;
use std::path::Path;
use std::thread;

use crossbeam_channel::unbounded;
use tracing::{info, warn};

use crate::config::{AnalyzerConfig, IngestSettings};
use crate::detection::{rate_window, AnomalyDetector};
use crate::error::{DumpstatError, Result};
use crate::models::dto::AnalysisResult;
use crate::parser::FieldExtractor;
use crate::report::build_result;
use crate::store::PacketStore;

/// Reads the whole capture. Invalid UTF-8 is replaced, not rejected.
pub fn read_capture<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| DumpstatError::CaptureRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn ingest_text(text: &str, extractor: &FieldExtractor, settings: &IngestSettings) -> PacketStore {
    let lines: Vec<&str> = text.lines().collect();
    let workers = worker_count(lines.len(), settings);

    if workers <= 1 {
        let mut store = PacketStore::new();
        for line in &lines {
            store.ingest(extractor.extract(line));
        }
        return store;
    }

    let chunk_size = lines.len().div_ceil(workers);
    let (tx, rx) = unbounded::<(usize, PacketStore)>();

    thread::scope(|scope| {
        for (index, chunk) in lines.chunks(chunk_size).enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let mut partial = PacketStore::new();
                for line in chunk {
                    partial.ingest(extractor.extract(line));
                }
                tx.send((index, partial))
                    .unwrap_or_else(|e| warn!("chunk channel error: {}", e));
            });
        }
    });
    drop(tx);

    let mut partials: Vec<(usize, PacketStore)> = rx.iter().collect();
    partials.sort_by_key(|(index, _)| *index);

    let mut store = PacketStore::new();
    for (_, partial) in partials {
        store.merge(partial);
    }
    info!(workers, records = store.len(), "parallel extraction merged");
    store
}

fn worker_count(lines: usize, settings: &IngestSettings) -> usize {
    let by_size = lines / settings.min_lines_per_worker.max(1);
    settings.workers.min(by_size).max(1)
}

pub fn analyze_text(text: &str, config: &AnalyzerConfig) -> Result<AnalysisResult> {
    config.validate()?;
    let extractor = FieldExtractor::new(&config.extraction)?;
    let store = ingest_text(text, &extractor, &config.ingest).finalize();
    info!(
        packets = store.total_packets(),
        skipped = store.total_skipped(),
        sources = store.distinct_sources(),
        "capture ingested"
    );

    let window = rate_window(&store, &config.rate);
    let detection = AnomalyDetector::new(&config.detection, window).detect(&store);
    Ok(build_result(&store, &detection, &config.report))
}

pub fn analyze_file<P: AsRef<Path>>(path: P, config: &AnalyzerConfig) -> Result<AnalysisResult> {
    let text = read_capture(&path)?;
    info!(path = %path.as_ref().display(), bytes = text.len(), "capture loaded");
    analyze_text(&text, config)
}
