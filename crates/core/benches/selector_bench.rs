//! Selector-parsing benchmarks over an in-memory document.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use pagesieve_core::analyzer::{AnalyzerCache, MemoryAnalyzer};
use pagesieve_core::select::parser::SelectionParser;

fn bench_selectors(c: &mut Criterion) {
    let texts: Vec<String> = (1..=500)
        .map(|p| {
            if p % 25 == 0 {
                format!("Chapter {}\nbody text page {p}", p / 25)
            } else if p % 25 == 5 {
                format!("Summary\nbody text page {p}")
            } else {
                format!("body text page {p}")
            }
        })
        .collect();
    let backend = MemoryAnalyzer::from_texts(&texts);
    let cache = AnalyzerCache::new(&backend);
    let parser = SelectionParser::new(&cache);

    c.bench_function("numeric_mixed", |b| {
        b.iter(|| parser.parse(black_box("1-50,75,100-90,first 10,::3")).unwrap())
    });

    c.bench_function("predicate_scan", |b| {
        b.iter(|| parser.parse(black_box("contains:'Chapter'")).unwrap())
    });

    c.bench_function("boolean_expression", |b| {
        b.iter(|| {
            parser
                .parse(black_box("contains:'Chapter' & !contains:'Summary' | 7"))
                .unwrap()
        })
    });

    c.bench_function("magazine_sections", |b| {
        b.iter(|| {
            parser
                .parse(black_box("contains:'Chapter' to contains:'Summary'"))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_selectors);
criterion_main!(benches);
