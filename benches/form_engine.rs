use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use prompt_tuner::domain::form::{collect, flatten, FieldModelBuilder, FormRenderer, Validator};
use prompt_tuner::domain::schema::SchemaDocument;
use serde_json::{json, Value};

/// Root with `width` properties, each an array of nested objects
fn wide_schema(width: usize) -> Value {
    let mut properties = serde_json::Map::new();
    for i in 0..width {
        properties.insert(
            format!("group_{}", i),
            json!({ "type": "array", "items": { "$ref": "#/$defs/Entry" }, "maxItems": 20 }),
        );
    }
    json!({
        "$defs": {
            "Entry": {
                "type": "object",
                "properties": {
                    "label": { "type": "string", "minLength": 2, "pattern": "^[a-z]+$" },
                    "weight": { "type": "number", "minimum": 0, "maximum": 1 },
                    "kind": { "type": "string", "enum": ["a", "b", "c"] }
                },
                "required": ["label"]
            },
            "Root": { "type": "object", "properties": properties }
        }
    })
}

fn wide_data(width: usize) -> Value {
    let mut data = serde_json::Map::new();
    for i in 0..width {
        let entries: Vec<Value> = (0..10)
            .map(|j| json!({ "label": "entry", "weight": (j as f64) / 10.0, "kind": "b" }))
            .collect();
        data.insert(format!("group_{}", i), Value::Array(entries));
    }
    Value::Object(data)
}

fn benchmark_build_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_model");
    for width in [5, 50] {
        let document = SchemaDocument::from_value(&wide_schema(width)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(width), &document, |b, doc| {
            b.iter(|| FieldModelBuilder::new(black_box(doc)).build_model(None).unwrap());
        });
    }
    group.finish();
}

fn benchmark_validate(c: &mut Criterion) {
    let document = SchemaDocument::from_value(&wide_schema(20)).unwrap();
    let model = FieldModelBuilder::new(&document).build_model(None).unwrap();
    let data = wide_data(20);

    c.bench_function("validate_200_entries", |b| {
        b.iter(|| Validator::validate(black_box(&model), black_box(&data)));
    });
}

fn benchmark_render_and_collect(c: &mut Criterion) {
    let document = SchemaDocument::from_value(&wide_schema(20)).unwrap();
    let model = FieldModelBuilder::new(&document).build_model(None).unwrap();
    let state = flatten(&model, &wide_data(20));

    c.bench_function("render_form", |b| {
        b.iter(|| FormRenderer::render(black_box(&model), black_box(&state)).to_html());
    });
    c.bench_function("collect_form", |b| {
        b.iter(|| collect(black_box(&model), black_box(&state)).unwrap());
    });
}

criterion_group!(
    benches,
    benchmark_build_model,
    benchmark_validate,
    benchmark_render_and_collect
);
criterion_main!(benches);
