//! Benchmarks for recognizer throughput and the redaction pipeline.
//!
//! Run with: cargo bench
//!
//! Inputs are synthetic statements with identifiers sprinkled through
//! filler text.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdf_sanitizer::document::{Page, Resources};
use pdf_sanitizer::fonts::Font;
use pdf_sanitizer::redaction::NoProgress;
use pdf_sanitizer::{Document, PatternKind, PatternMatcher, Redactor, SanitizerConfig};

/// One line of filler with a PAN, an Aadhaar number and a GSTIN.
fn statement_line(i: usize) -> String {
    format!(
        "Txn {:05} credited to holder ABCDE1234F, Aadhaar 2341 2341 2346, supplier 27AAPFU0939F1ZV, account 0012345678{:02}. ",
        i,
        i % 100
    )
}

fn statement_text(lines: usize) -> String {
    (0..lines).map(statement_line).collect()
}

fn config() -> SanitizerConfig {
    SanitizerConfig::baseline(PatternKind::ALL)
        .with_bank_account_digits(9, 18)
        .with_terms(["confidential", "salary"])
}

fn statement_document(pages: usize) -> Document {
    let mut builder = Document::builder().metadata("Title", "Monthly statement");
    for p in 0..pages {
        let mut content = String::from("BT /F1 9 Tf 40 800 Td 11 TL\n");
        for i in 0..40 {
            content.push_str(&format!("({}) '\n", statement_line(p * 40 + i)));
        }
        content.push_str("ET");
        let resources = Resources::new().with_font("F1", Font::simple("Helvetica"));
        builder = builder.page(Page::from_content(content.as_bytes(), resources).unwrap());
    }
    builder.build()
}

fn bench_find_all(c: &mut Criterion) {
    let matcher = PatternMatcher::new(&config()).unwrap();
    let mut group = c.benchmark_group("find_all");
    for lines in [10, 100, 1000] {
        let text = statement_text(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &text, |b, text| {
            b.iter(|| matcher.find_all(black_box(text)))
        });
    }
    group.finish();
}

fn bench_single_kind(c: &mut Criterion) {
    let matcher = PatternMatcher::new(&config()).unwrap();
    let text = statement_text(200);
    let mut group = c.benchmark_group("find_kind");
    for kind in PatternKind::ALL {
        group.bench_function(kind.to_string(), |b| {
            b.iter(|| matcher.find(black_box(&text), kind).count())
        });
    }
    group.finish();
}

fn bench_redact(c: &mut Criterion) {
    let doc = statement_document(16);
    let mut group = c.benchmark_group("redact");
    group.sample_size(20);
    for parallel in [false, true] {
        let redactor = Redactor::new(config().with_parallel(parallel)).unwrap();
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(name, |b| b.iter(|| redactor.redact(black_box(&doc), &NoProgress).unwrap()));
    }
    group.finish();
}

criterion_group!(benches, bench_find_all, bench_single_kind, bench_redact);
criterion_main!(benches);
