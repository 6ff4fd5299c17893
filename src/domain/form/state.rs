//! Form control state and its collection into a data tree
//!
//! [`FormState`] holds the raw text of every control keyed by its concrete
//! address, plus explicit item counts for arrays. [`collect`] is the
//! structural inverse of rendering: each address is parsed back into nested
//! object/array assignments. [`flatten`] goes the other way, seeding controls
//! from a previously saved data tree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use super::field::{display_value, is_empty_value, FieldDescriptor, FieldKind, FieldModel};
use super::path::{FieldPath, PathParseError, PathSegment};

/// A control address that cannot be mapped back into the data tree.
///
/// Always a render/collect contract violation, never a user input problem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollectionMismatchError {
    #[error("Control address '{address}' is not parseable: {source}")]
    Unparseable {
        address: String,
        #[source]
        source: PathParseError,
    },

    #[error("No field is declared at '{address}'")]
    UnknownField { address: String },

    #[error("'{address}' is a {kind:?} field and has no input control")]
    NotAControl { address: String, kind: FieldKind },

    #[error("Control '{address}' conflicts with a value already collected")]
    Conflict { address: String },
}

/// Raw control values of one form
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    /// Control address → entered text; union selectors hold the branch index
    #[serde(default)]
    pub values: IndexMap<FieldPath, String>,
    /// Array address → number of items on display
    #[serde(default)]
    pub item_counts: BTreeMap<FieldPath, usize>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &FieldPath) -> Option<&str> {
        self.values.get(address).map(String::as_str)
    }

    pub fn set(&mut self, address: FieldPath, value: impl Into<String>) {
        self.values.insert(address, value.into());
    }

    /// Branch chosen at a union address; the first branch when unset
    pub fn selected_branch(&self, union: &FieldPath) -> usize {
        self.branch_selection(union).unwrap_or(0)
    }

    /// Branch explicitly chosen at a union address, if any
    pub fn branch_selection(&self, union: &FieldPath) -> Option<usize> {
        self.get(union).and_then(|v| v.trim().parse().ok())
    }

    /// Items shown for an array: the explicit count, else one past the highest
    /// index any control uses
    pub fn item_count(&self, array: &FieldPath) -> Option<usize> {
        if let Some(count) = self.item_counts.get(array) {
            return Some(*count);
        }
        let depth = array.depth();
        self.values
            .keys()
            .filter(|addr| array.is_strict_prefix_of(addr))
            .filter_map(|addr| match addr.segments().get(depth) {
                Some(PathSegment::Index(i)) => Some(i + 1),
                _ => None,
            })
            .max()
    }

    /// Drop every control and count strictly below `prefix`
    pub fn clear_under(&mut self, prefix: &FieldPath) {
        self.values.retain(|addr, _| !prefix.is_strict_prefix_of(addr));
        self.item_counts.retain(|addr, _| !prefix.is_strict_prefix_of(addr));
    }

    /// True when `address` lies in a union branch other than the selected one
    pub fn is_hidden(&self, address: &FieldPath) -> bool {
        address
            .branch_choices()
            .iter()
            .any(|(union, branch)| self.selected_branch(union) != *branch)
    }
}

/// Intermediate tree; array slots remember their control address so that
/// the final conversion can keep every item at its control index
enum Slot {
    Leaf(Value),
    Object(IndexMap<String, Slot>),
    Array {
        address: FieldPath,
        items: BTreeMap<usize, Slot>,
    },
}

impl Slot {
    fn array(address: FieldPath) -> Self {
        Slot::Array {
            address,
            items: BTreeMap::new(),
        }
    }

    fn into_value(self, model: &FieldModel, state: &FormState) -> Value {
        match self {
            Slot::Leaf(v) => v,
            Slot::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_value(model, state)))
                    .collect::<Map<_, _>>(),
            ),
            Slot::Array { address, mut items } => {
                // Blank trailing items only count when the list was sized explicitly
                let filled = items.keys().next_back().map_or(0, |last| last + 1);
                let count = state.item_counts.get(&address).copied().unwrap_or(0).max(filled);
                let template = model.descriptor_for(&address).and_then(FieldDescriptor::item);
                Value::Array(
                    (0..count)
                        .map(|i| match items.remove(&i) {
                            Some(slot) => slot.into_value(model, state),
                            None => blank_item(template),
                        })
                        .collect(),
                )
            }
        }
    }
}

/// Value of an item on display with nothing entered in it
fn blank_item(template: Option<&FieldDescriptor>) -> Value {
    match template.map(|t| t.kind) {
        Some(FieldKind::Object) => Value::Object(Map::new()),
        Some(FieldKind::Array) => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}

/// Rebuild the nested data tree from control values.
///
/// Empty controls are skipped, union selectors are not data, and controls of
/// unselected union branches are discarded. Array items keep the index of
/// their controls: a blank item before a filled one, or inside an explicit
/// item count, is kept as an empty value so that validation errors land on
/// the control the user sees.
pub fn collect(model: &FieldModel, state: &FormState) -> Result<Value, CollectionMismatchError> {
    let mut root = Slot::Object(IndexMap::new());

    for (address, raw) in &state.values {
        let field = model.descriptor_for(address).ok_or_else(|| {
            warn!(address = %address, "Control has no field descriptor");
            CollectionMismatchError::UnknownField {
                address: address.to_string(),
            }
        })?;

        if field.kind == FieldKind::Union {
            continue;
        }
        if !field.kind.is_leaf() {
            warn!(address = %address, kind = ?field.kind, "Control address names a container field");
            return Err(CollectionMismatchError::NotAControl {
                address: address.to_string(),
                kind: field.kind,
            });
        }
        if raw.is_empty() || state.is_hidden(address) {
            continue;
        }

        assign(&mut root, address, coerce(field, raw))?;
    }

    for (address, count) in &state.item_counts {
        if *count == 0 || state.is_hidden(address) {
            continue;
        }
        match model.descriptor_for(address) {
            Some(field) if field.kind == FieldKind::Array => ensure_array(&mut root, address)?,
            _ => {
                return Err(CollectionMismatchError::UnknownField {
                    address: address.to_string(),
                })
            }
        }
    }

    Ok(root.into_value(model, state))
}

/// Parse textual control addresses into a state, rejecting malformed ones
pub fn state_from_fields<'a>(
    fields: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Result<FormState, CollectionMismatchError> {
    let mut state = FormState::new();
    for (address, value) in fields {
        let path = FieldPath::parse(address).map_err(|source| CollectionMismatchError::Unparseable {
            address: address.clone(),
            source,
        })?;
        state.set(path, value.clone());
    }
    Ok(state)
}

fn assign(root: &mut Slot, address: &FieldPath, value: Value) -> Result<(), CollectionMismatchError> {
    match place(root, address, Slot::Leaf(value))? {
        (_, true) => Ok(()),
        (_, false) => Err(CollectionMismatchError::Conflict {
            address: address.to_string(),
        }),
    }
}

fn ensure_array(root: &mut Slot, array: &FieldPath) -> Result<(), CollectionMismatchError> {
    match place(root, array, Slot::array(array.clone()))? {
        (Slot::Array { .. }, _) => Ok(()),
        _ => Err(CollectionMismatchError::Conflict {
            address: array.to_string(),
        }),
    }
}

/// Walk to the slot for `address`, creating containers on the way and `end`
/// at the final data segment. The flag is true when `end` was placed.
fn place<'s>(
    root: &'s mut Slot,
    address: &FieldPath,
    end: Slot,
) -> Result<(&'s mut Slot, bool), CollectionMismatchError> {
    let conflict = || CollectionMismatchError::Conflict {
        address: address.to_string(),
    };
    let segments = address.segments();
    let data_positions: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| !matches!(s, PathSegment::Branch(_)))
        .map(|(i, _)| i)
        .collect();

    let mut end = Some(end);
    let mut placed = false;
    let mut current = root;

    for (n, &pos) in data_positions.iter().enumerate() {
        let next = data_positions.get(n + 1).copied();
        let mut fresh = || match next {
            None => {
                placed = true;
                end.take().unwrap_or_else(|| Slot::Object(IndexMap::new()))
            }
            // A container's control address runs up to the next data segment,
            // so an array held by a union branch is addressed through the branch
            Some(next) if matches!(segments[next], PathSegment::Index(_)) => {
                Slot::array(FieldPath::from_segments(segments[..next].to_vec()))
            }
            Some(_) => Slot::Object(IndexMap::new()),
        };

        current = match (current, &segments[pos]) {
            (Slot::Object(map), PathSegment::Field(name)) => map.entry(name.clone()).or_insert_with(&mut fresh),
            (Slot::Array { items, .. }, PathSegment::Index(idx)) => items.entry(*idx).or_insert_with(&mut fresh),
            _ => return Err(conflict()),
        };
    }
    Ok((current, placed))
}

/// Turn entered text into a typed value. Unparseable numbers and booleans
/// are kept as text for the validator to report.
fn coerce(field: &FieldDescriptor, raw: &str) -> Value {
    match field.kind {
        FieldKind::Number => {
            let trimmed = raw.trim();
            if field.rules.integer {
                if let Ok(n) = trimmed.parse::<i64>() {
                    return Value::from(n);
                }
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
                .unwrap_or_else(|| Value::String(raw.to_string()))
        }
        FieldKind::Boolean => match raw.trim() {
            "true" | "on" => Value::Bool(true),
            "false" | "off" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        FieldKind::Select => field
            .options
            .iter()
            .find(|o| o.label == raw)
            .map(|o| o.value.clone())
            .unwrap_or_else(|| Value::String(raw.to_string())),
        FieldKind::Raw => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
        _ => Value::String(raw.to_string()),
    }
}

/// Seed control values from a saved data tree.
///
/// Keys the model does not declare, and values of the wrong shape for their
/// field, are ignored.
pub fn flatten(model: &FieldModel, data: &Value) -> FormState {
    let mut state = FormState::new();
    flatten_into(&model.root, data, FieldPath::root(), &mut state);
    state
}

fn flatten_into(field: &FieldDescriptor, value: &Value, address: FieldPath, state: &mut FormState) {
    match (field.kind, value) {
        (FieldKind::Object, Value::Object(map)) => {
            for child in &field.children {
                if let Some(v) = map.get(&child.name) {
                    flatten_into(child, v, address.child(&child.name), state);
                }
            }
        }
        (FieldKind::Array, Value::Array(items)) => {
            state.item_counts.insert(address.clone(), items.len());
            if let Some(template) = field.item() {
                for (i, item) in items.iter().enumerate() {
                    flatten_into(template, item, address.index(i), state);
                }
            }
        }
        (FieldKind::Union, v) if !v.is_null() => {
            if let Some(branch) = infer_branch(field, v) {
                state.set(address.clone(), branch.to_string());
                flatten_into(&field.children[branch], v, address.branch(branch), state);
            }
        }
        (FieldKind::Raw, v) if !v.is_null() => {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            state.set(address, text);
        }
        (FieldKind::Text | FieldKind::Number | FieldKind::Boolean | FieldKind::Select, v)
            if !v.is_object() && !v.is_array() && !v.is_null() =>
        {
            state.set(address, display_value(v));
        }
        _ => {}
    }
}

/// First union branch whose shape accepts `value`
pub fn infer_branch(union: &FieldDescriptor, value: &Value) -> Option<usize> {
    union.children.iter().position(|branch| matches_shape(branch, value))
}

fn matches_shape(field: &FieldDescriptor, value: &Value) -> bool {
    match field.kind {
        FieldKind::Text => value.is_string(),
        FieldKind::Number => match value {
            Value::Number(n) => !field.rules.integer || n.is_i64() || n.is_u64(),
            _ => false,
        },
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Select => field.rules.enum_values.contains(value),
        FieldKind::Array => match value {
            Value::Array(items) => field
                .item()
                .map(|item| items.iter().all(|v| matches_shape(item, v)))
                .unwrap_or(true),
            _ => false,
        },
        FieldKind::Object => match value {
            Value::Object(map) => {
                map.keys().all(|k| field.child(k).is_some())
                    && field
                        .children
                        .iter()
                        .filter(|c| c.required)
                        .all(|c| !is_empty_value(map.get(&c.name)))
            }
            _ => false,
        },
        FieldKind::Union => infer_branch(field, value).is_some(),
        FieldKind::Raw => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::form::builder::FieldModelBuilder;
    use crate::domain::schema::SchemaDocument;
    use serde_json::json;

    fn model() -> FieldModel {
        let doc = SchemaDocument::from_value(&json!({ "$defs": {
            "Bike": { "type": "object", "required": ["gears"], "properties": { "gears": { "type": "integer" } } },
            "Car": { "type": "object", "properties": { "doors": { "type": "integer" }, "electric": { "type": "boolean" } } },
            "Root": { "type": "object", "properties": {
                "title": { "type": "string" },
                "price": { "type": "number" },
                "size": { "type": "string", "enum": ["S", "M"] },
                "level": { "type": "integer", "enum": [1, 2] },
                "extra": {},
                "stores": { "type": "array", "items": { "type": "object", "properties": {
                    "name": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                } } },
                "vehicle": { "oneOf": [{ "$ref": "#/$defs/Bike" }, { "$ref": "#/$defs/Car" }] }
            } }
        } }))
        .unwrap();
        FieldModelBuilder::new(&doc).build_model(None).unwrap()
    }

    fn state(pairs: &[(&str, &str)]) -> FormState {
        let mut s = FormState::new();
        for (addr, value) in pairs {
            s.set(FieldPath::parse(addr).unwrap(), *value);
        }
        s
    }

    #[test]
    fn test_collect_nested_and_typed() {
        let m = model();
        let s = state(&[
            ("title", "Shop"),
            ("price", "9.5"),
            ("level", "2"),
            ("size", "M"),
            ("extra", r#"{"k": [1]}"#),
            ("stores[0].name", "North"),
            ("stores[0].tags[0]", "a"),
            ("stores[0].tags[1]", "b"),
            ("stores[1].name", "South"),
        ]);
        let data = collect(&m, &s).unwrap();
        assert_eq!(
            data,
            json!({
                "title": "Shop",
                "price": 9.5,
                "level": 2,
                "size": "M",
                "extra": { "k": [1] },
                "stores": [{ "name": "North", "tags": ["a", "b"] }, { "name": "South" }]
            })
        );
    }

    #[test]
    fn test_collect_keeps_items_at_control_indices() {
        let m = model();
        let s = state(&[("title", ""), ("stores[0].name", ""), ("stores[2].name", "C")]);
        assert_eq!(collect(&m, &s).unwrap(), json!({ "stores": [{}, {}, { "name": "C" }] }));
        assert_eq!(collect(&m, &FormState::new()).unwrap(), json!({}));

        // Trailing blank items are dropped unless the list was sized explicitly
        let s = state(&[("stores[0].name", "A"), ("stores[1].name", ""), ("stores[0].tags[1]", "b")]);
        assert_eq!(
            collect(&m, &s).unwrap(),
            json!({ "stores": [{ "name": "A", "tags": [null, "b"] }] })
        );

        let mut s = state(&[("stores[1].name", "B")]);
        s.item_counts.insert(FieldPath::parse("stores").unwrap(), 3);
        s.item_counts.insert(FieldPath::parse("stores[2].tags").unwrap(), 1);
        assert_eq!(
            collect(&m, &s).unwrap(),
            json!({ "stores": [{}, { "name": "B" }, { "tags": [null] }] })
        );
    }

    #[test]
    fn test_explicit_count_without_values_yields_blank_items() {
        let m = model();
        let mut s = FormState::new();
        s.item_counts.insert(FieldPath::parse("stores").unwrap(), 2);
        assert_eq!(collect(&m, &s).unwrap(), json!({ "stores": [{}, {}] }));

        // A count of zero is the same as no list at all
        s.item_counts.insert(FieldPath::parse("stores").unwrap(), 0);
        assert_eq!(collect(&m, &s).unwrap(), json!({}));
    }

    #[test]
    fn test_collect_discards_unselected_branch() {
        let m = model();
        let s = state(&[("vehicle", "1"), ("vehicle@0.gears", "21"), ("vehicle@1.doors", "4")]);
        assert_eq!(collect(&m, &s).unwrap(), json!({ "vehicle": { "doors": 4 } }));
    }

    #[test]
    fn test_unparseable_number_is_kept_as_text() {
        let m = model();
        let s = state(&[("price", "cheap")]);
        assert_eq!(collect(&m, &s).unwrap(), json!({ "price": "cheap" }));
    }

    #[test]
    fn test_mismatched_addresses() {
        let m = model();
        assert!(matches!(
            collect(&m, &state(&[("unknown", "x")])),
            Err(CollectionMismatchError::UnknownField { .. })
        ));
        assert!(matches!(
            collect(&m, &state(&[("stores[0]", "x")])),
            Err(CollectionMismatchError::NotAControl { kind: FieldKind::Object, .. })
        ));

        let fields: IndexMap<String, String> = [("stores[x].name".to_string(), "a".to_string())].into_iter().collect();
        assert!(matches!(
            state_from_fields(&fields),
            Err(CollectionMismatchError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_flatten_round_trip() {
        let m = model();
        let data = json!({
            "title": "Shop",
            "level": 1,
            "stores": [{ "name": "North", "tags": ["x"] }, { "name": "South" }],
            "vehicle": { "doors": 2, "electric": true },
            "ignored": "value"
        });
        let s = flatten(&m, &data);
        assert_eq!(s.get(&FieldPath::parse("vehicle").unwrap()), Some("1"));
        assert_eq!(s.get(&FieldPath::parse("stores[1].name").unwrap()), Some("South"));
        assert_eq!(s.item_count(&FieldPath::parse("stores").unwrap()), Some(2));

        let mut expected = data.clone();
        expected.as_object_mut().unwrap().remove("ignored");
        assert_eq!(collect(&m, &s).unwrap(), expected);
    }

    #[test]
    fn test_infer_branch_by_shape() {
        let m = model();
        let vehicle = m.find(&FieldPath::parse("vehicle").unwrap()).unwrap();
        assert_eq!(infer_branch(vehicle, &json!({ "gears": 3 })), Some(0));
        assert_eq!(infer_branch(vehicle, &json!({ "doors": 3 })), Some(1));
        assert_eq!(infer_branch(vehicle, &json!({ "wings": 2 })), None);
        assert_eq!(infer_branch(vehicle, &json!("car")), None);
    }

    #[test]
    fn test_item_count_from_values() {
        let s = state(&[("stores[0].name", "a"), ("stores[3].name", "b")]);
        assert_eq!(s.item_count(&FieldPath::parse("stores").unwrap()), Some(4));
        assert_eq!(s.item_count(&FieldPath::parse("other").unwrap()), None);
    }
}
