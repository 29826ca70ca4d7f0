use std::hint::black_box;
use std::sync::Arc;

use core_config::Config;
use core_layout::{HierarchyOptions, LayoutHierarchy};
use core_text::Document;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

fn config() -> Config {
    Config::from_toml_str("[check]\nintegrity = \"off\"\n").unwrap()
}

fn document(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("fn item_{i}(x: u32) -> u32 {{ x * {i} + 1 }}\n"))
        .collect()
}

fn bench_typing(c: &mut Criterion) {
    let doc = Arc::new(Document::new(&document(10_000)));
    let hierarchy = LayoutHierarchy::attach(doc.clone(), HierarchyOptions::new(config())).unwrap();
    let middle = doc.len_chars() / 2;
    c.bench_function("type_and_delete_char_10k_lines", |b| {
        b.iter(|| {
            doc.insert(black_box(middle), "x").unwrap();
            doc.remove(black_box(middle), 1).unwrap();
        })
    });
    black_box(hierarchy.paragraph_count());
}

fn bench_line_split(c: &mut Criterion) {
    let doc = Arc::new(Document::new(&document(10_000)));
    let hierarchy = LayoutHierarchy::attach(doc.clone(), HierarchyOptions::new(config())).unwrap();
    let middle = doc.len_chars() / 2;
    c.bench_function("split_and_join_line_10k_lines", |b| {
        b.iter(|| {
            doc.insert(black_box(middle), "\n").unwrap();
            doc.remove(black_box(middle), 1).unwrap();
        })
    });
    black_box(hierarchy.paragraph_count());
}

fn bench_initial_build(c: &mut Criterion) {
    let text = document(2_000);
    c.bench_function("attach_2k_lines", |b| {
        b.iter_batched(
            || Arc::new(Document::new(&text)),
            |doc| LayoutHierarchy::attach(doc, HierarchyOptions::new(config())).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_typing, bench_line_split, bench_initial_build);
criterion_main!(benches);
