use std::hint::black_box;
use std::sync::Arc;

use core_config::Config;
use core_layout::run::content_hash;
use core_layout::wrap::partition;
use core_layout::{AttrId, HierarchyOptions, LayoutHierarchy, LeafRun, NodeList, RunKind, ShapedText, WrapSettings};
use core_text::Document;
use criterion::{Criterion, criterion_group, criterion_main};

const CHAR_WIDTH: f64 = 7.0;

fn long_paragraph(words: usize) -> (String, NodeList<LeafRun>) {
    let mut text: String = (0..words).map(|i| format!("word{} ", i % 97)).collect();
    text.push('\n');
    let chars: Vec<char> = text.chars().collect();
    let body = &chars[..chars.len() - 1];
    let mut runs: Vec<LeafRun> = body
        .chunks(64)
        .map(|chunk| {
            let s: String = chunk.iter().collect();
            let shaped = Arc::new(ShapedText::new(vec![CHAR_WIDTH; chunk.len()]));
            LeafRun::text(chunk.len(), AttrId::default(), content_hash(&s), shaped)
        })
        .collect();
    runs.push(LeafRun::with_width(
        RunKind::Newline,
        1,
        CHAR_WIDTH,
        AttrId::default(),
        content_hash("\n"),
        None,
    ));
    (text, NodeList::from_vec(runs, 16))
}

fn bench_partition(c: &mut Criterion) {
    let (text, runs) = long_paragraph(2_000);
    let settings = WrapSettings::default();
    c.bench_function("partition_2000_words_80_cols", |b| {
        b.iter(|| {
            let info = partition(&runs, black_box(&text), 80.0 * CHAR_WIDTH, CHAR_WIDTH, &settings);
            black_box(info.row_count())
        })
    });
}

fn bench_width_transaction(c: &mut Criterion) {
    let text: String = (0..500)
        .map(|i| format!("line {i} with a handful of words that wrap at narrow widths\n"))
        .collect();
    let config = Config::from_toml_str("[wrap]\nenabled = true\n[check]\nintegrity = \"off\"\n").unwrap();
    let doc = Arc::new(Document::new(&text));
    let hierarchy = LayoutHierarchy::attach(doc, HierarchyOptions::new(config).available_width(280.0)).unwrap();
    let mut narrow = true;
    c.bench_function("relayout_500_paragraphs_on_width_change", |b| {
        b.iter(|| {
            narrow = !narrow;
            hierarchy.set_available_width(Some(if narrow { 280.0 } else { 420.0 }));
            black_box(hierarchy.ensure_layout(0.0..f64::MAX).unwrap())
        })
    });
}

criterion_group!(benches, bench_partition, bench_width_transaction);
criterion_main!(benches);
