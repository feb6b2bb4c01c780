//! 对账 id 提取和列号换算基准测试

use std::hint::black_box;

use clickrelay::reconcile::{extract_command_id, extract_free_text_id};
use clickrelay::store::column_letter;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

// ============== extract_command_id ==============

fn bench_extract_command_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/extract_command_id");

    group.bench_function("plain", |b| {
        b.iter(|| extract_command_id(black_box("/start 1042")).unwrap());
    });

    group.bench_function("missing_id", |b| {
        b.iter(|| assert!(extract_command_id(black_box("/start")).is_err()));
    });

    group.finish();
}

// ============== extract_free_text_id ==============

fn bench_extract_free_text_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/extract_free_text_id");

    group.bench_function("prefill", |b| {
        b.iter(|| extract_free_text_id(black_box("Здравствуйте! Мой код: 1042")).unwrap());
    });

    // 长文本，id 在末尾
    for words in [10usize, 100, 1000] {
        let text = format!("{} 123456", "lorem ipsum 42 ".repeat(words));
        group.bench_with_input(BenchmarkId::new("words", words), &text, |b, text| {
            b.iter(|| extract_free_text_id(black_box(text)).unwrap());
        });
    }

    group.bench_function("no_match", |b| {
        b.iter(|| assert!(extract_free_text_id(black_box("hello there 12 345")).is_err()));
    });

    group.finish();
}

// ============== column_letter ==============

fn bench_column_letter(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/column_letter");

    for index in [1usize, 15, 702, 16384] {
        group.bench_with_input(BenchmarkId::new("index", index), &index, |b, &index| {
            b.iter(|| column_letter(black_box(index)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_extract_command_id,
    bench_extract_free_text_id,
    bench_column_letter
);
criterion_main!(benches);
