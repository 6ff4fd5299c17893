use chrono::Duration;
use indexmap::IndexMap;
use prompt_tuner::domain::clock::ManualClock;
use prompt_tuner::domain::form::{
    collect, flatten, state_from_fields, FieldKind, FieldModel, FieldModelBuilder, FieldPath,
    FormSession, Validator,
};
use prompt_tuner::domain::output::{ExportFormat, Exporter, OutputRenderer, OutputView, ViewMode};
use prompt_tuner::domain::schema::{RootStrategy, SchemaDocument};
use serde_json::{json, Value};
use std::sync::Arc;

fn campaign_schema() -> Value {
    json!({
        "type": "object",
        "title": "Campaign",
        "properties": {
            "name": { "type": "string", "maxLength": 10 },
            "budget": { "type": ["number", "null"], "minimum": 0 },
            "channel": { "anyOf": [{ "$ref": "#/definitions/Email" }, { "type": "string" }] },
            "audience": { "type": "array", "items": { "type": "string" }, "minItems": 1 }
        },
        "required": ["name", "audience"],
        "definitions": {
            "Email": {
                "type": "object",
                "properties": { "subject": { "type": "string" } },
                "required": ["subject"]
            }
        }
    })
}

fn model() -> FieldModel {
    let document = SchemaDocument::from_value(&campaign_schema()).unwrap();
    FieldModelBuilder::new(&document).build_model(None).unwrap()
}

fn fields(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_inline_root_model() {
    let model = model();
    assert_eq!(model.selection.strategy, RootStrategy::InlineRoot);
    assert_eq!(model.root.label, "Campaign");

    let budget = model.find(&FieldPath::parse("budget").unwrap()).unwrap();
    assert_eq!(budget.kind, FieldKind::Number);
    assert!(budget.nullable);

    let channel = model.find(&FieldPath::parse("channel").unwrap()).unwrap();
    assert_eq!(channel.kind, FieldKind::Union);
    let labels: Vec<&str> = channel.children.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Email", "string"]);
}

#[test]
fn test_collect_then_validate() {
    let model = model();
    let state = state_from_fields(&fields(&[
        ("name", "Spring"),
        ("budget", "250.5"),
        ("channel", "0"),
        ("channel@0.subject", "Hi"),
        ("channel@1", "ignored"),
        ("audience[0]", "devs"),
    ]))
    .unwrap();

    let data = collect(&model, &state).unwrap();
    assert_eq!(
        data,
        json!({ "name": "Spring", "budget": 250.5, "channel": { "subject": "Hi" }, "audience": ["devs"] })
    );
    assert!(Validator::validate(&model, &data).is_empty());

    let state = state_from_fields(&fields(&[("name", "Spring"), ("channel", "1"), ("channel@1", "sms")])).unwrap();
    let data = collect(&model, &state).unwrap();
    assert_eq!(data, json!({ "name": "Spring", "channel": "sms" }));

    let errors = Validator::validate(&model, &data);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path.to_string(), "audience");
}

#[test]
fn test_validation_reports_every_field() {
    let model = model();
    let errors = Validator::validate(
        &model,
        &json!({ "name": "A very long name", "budget": -1, "channel": { "subject": 5 }, "audience": [] }),
    );
    let paths: Vec<String> = errors.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(paths, vec!["name", "budget", "channel@0.subject", "audience"]);
}

#[test]
fn test_revision_prefill_round_trip() {
    let model = model();
    let saved = json!({ "name": "Spring", "channel": { "subject": "Hi" }, "audience": ["a", "b"] });
    let state = flatten(&model, &saved);
    assert_eq!(collect(&model, &state).unwrap(), saved);
}

#[test]
fn test_session_edit_cycle() {
    let clock = Arc::new(ManualClock::default());
    let mut session = FormSession::new(Arc::new(model()), clock.clone(), Duration::milliseconds(300));

    session.set(&FieldPath::parse("name").unwrap(), "Launch").unwrap();
    assert!(session.poll_validation().is_none());
    clock.advance(Duration::milliseconds(300));
    let errors = session.poll_validation().unwrap();
    assert_eq!(errors.len(), 1);

    let audience = FieldPath::parse("audience").unwrap();
    session.set(&audience.index(0), "ops").unwrap();
    let index = session.add_item(&audience).unwrap();
    assert_eq!(index, 1);

    // The added item is on display, so leaving it blank is an error at its control
    let submission = session.submit().unwrap();
    assert_eq!(submission.data["audience"], json!(["ops", null]));
    let paths: Vec<String> = submission.errors.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(paths, vec!["audience[1]"]);

    session.set(&audience.index(index), "dev").unwrap();
    let submission = session.submit().unwrap();
    assert!(submission.is_valid());
    assert_eq!(submission.data["audience"], json!(["ops", "dev"]));
}

#[test]
fn test_output_pipeline() {
    let payload = json!({
        "summary": "Two channels",
        "results": [{ "channel": "email", "opens": 120 }, { "channel": "sms", "opens": 45 }]
    });

    let rendered = OutputRenderer::render(&payload, ViewMode::Auto);
    assert!(matches!(rendered.view, OutputView::Cards { .. }));
    assert!(rendered.fallback.is_none());

    let raw = OutputRenderer::render(&payload, ViewMode::Raw);
    assert!(matches!(raw.view, OutputView::Raw { .. }));

    let file = Exporter::new("campaign").export(&payload["results"], ExportFormat::Csv).unwrap();
    assert_eq!(file.filename, "campaign.csv");
    assert_eq!(file.text(), "channel,opens\n\"email\",\"120\"\n\"sms\",\"45\"\n");
}
