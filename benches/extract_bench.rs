use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dumpstat::config::{AnalyzerConfig, ExtractionSettings, IngestSettings};
use dumpstat::ingest::ingest_text;
use dumpstat::parser::FieldExtractor;

fn synthetic_capture(lines: usize) -> String {
    let mut text = String::with_capacity(lines * 96);
    for i in 0..lines {
        match i % 10 {
            0 => text.push_str(&format!(
                "12:00:{:02}.{:06} ARP, Request who-has 10.0.0.1 tell 10.0.0.{}, length 28\n",
                i % 60,
                i % 1_000_000,
                i % 250
            )),
            1 => text.push_str("\t0x0000:  4500 003c 1c46 4000 4006 b1e6 c0a8 010a\n"),
            _ => text.push_str(&format!(
                "12:00:{:02}.{:06} IP 10.0.{}.{}.{} > 10.1.0.1.https: Flags [{}], seq 1, length {}\n",
                i % 60,
                i % 1_000_000,
                i % 4,
                i % 250,
                20000 + i % 40000,
                if i % 3 == 0 { "S" } else { "P." },
                i % 1500
            )),
        }
    }
    text
}

fn bench_extract(c: &mut Criterion) {
    let extractor = FieldExtractor::new(&ExtractionSettings::default()).unwrap();
    let line = "12:00:01.000001 IP 10.0.0.5.51514 > 10.1.0.1.https: Flags [S], seq 1, win 64240, length 0";
    c.bench_function("extract_ip_line", |b| b.iter(|| extractor.extract(black_box(line))));
}

fn bench_ingest(c: &mut Criterion) {
    let text = synthetic_capture(50_000);
    let extractor = FieldExtractor::new(&ExtractionSettings::default()).unwrap();

    c.bench_function("ingest_50k_single", |b| {
        b.iter(|| ingest_text(black_box(&text), &extractor, &IngestSettings::default()))
    });
    c.bench_function("ingest_50k_4_workers", |b| {
        let settings = IngestSettings {
            workers: 4,
            min_lines_per_worker: 1_000,
        };
        b.iter(|| ingest_text(black_box(&text), &extractor, &settings))
    });
}

fn bench_analyze(c: &mut Criterion) {
    let text = synthetic_capture(50_000);
    let config = AnalyzerConfig::default();
    c.bench_function("analyze_50k", |b| {
        b.iter(|| dumpstat::analyze_text(black_box(&text), &config).unwrap())
    });
}

criterion_group!(benches, bench_extract, bench_ingest, bench_analyze);
criterion_main!(benches);
