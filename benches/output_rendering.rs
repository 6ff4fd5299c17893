use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use prompt_tuner::domain::output::{classify, ExportFormat, Exporter, OutputRenderer, ViewMode};
use serde_json::{json, Value};

fn rows(count: usize) -> Value {
    Value::Array(
        (0..count)
            .map(|i| json!({ "id": i, "name": format!("row {}", i), "tags": ["x", "y"], "score": i as f64 * 0.5 }))
            .collect(),
    )
}

fn text_report(sections: usize) -> Value {
    let mut text = String::new();
    for s in 0..sections {
        text.push_str(&format!("## Section {}\n| Key | Value |\n|---|---|\n", s));
        for r in 0..10 {
            text.push_str(&format!("| k{} | v{} |\n", r, r));
        }
        text.push('\n');
    }
    Value::String(text)
}

fn benchmark_classify(c: &mut Criterion) {
    let table = rows(500);
    let report = text_report(20);

    c.bench_function("classify_table", |b| {
        b.iter(|| {
            let _ = classify(black_box(&table));
        });
    });
    c.bench_function("classify_text_tables", |b| {
        b.iter(|| {
            let _ = classify(black_box(&report));
        });
    });
}

fn benchmark_render_modes(c: &mut Criterion) {
    let payload = rows(200);
    let mut group = c.benchmark_group("render");
    for mode in [ViewMode::Auto, ViewMode::Cards, ViewMode::Raw] {
        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |b, mode| {
            b.iter(|| OutputRenderer::render(black_box(&payload), *mode).view.to_html());
        });
    }
    group.finish();
}

fn benchmark_export(c: &mut Criterion) {
    let payload = rows(1000);
    let exporter = Exporter::new("bench");

    c.bench_function("export_csv", |b| {
        b.iter(|| exporter.export(black_box(&payload), ExportFormat::Csv).unwrap());
    });
}

criterion_group!(benches, benchmark_classify, benchmark_render_modes, benchmark_export);
criterion_main!(benches);
