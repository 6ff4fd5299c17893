//! Constraint validation of a data tree against the field model

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::field::{is_empty_value, FieldDescriptor, FieldKind, FieldModel};
use super::path::FieldPath;
use super::state::{infer_branch, FormState};

/// A violated constraint, addressed by control path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: FieldPath,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

/// Validates data trees; compiled patterns are reused within one pass
#[derive(Default)]
pub struct Validator<'s> {
    patterns: HashMap<String, Result<Regex, String>>,
    selections: Option<&'s FormState>,
}

impl<'s> Validator<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every violation in `data`, in field order.
    ///
    /// Siblings are checked independently; nothing aborts the pass early.
    /// Union values are checked against the first branch their shape fits.
    pub fn validate(model: &FieldModel, data: &Value) -> Vec<ValidationError> {
        Self::new().run(model, data)
    }

    /// Like [`Validator::validate`], but a union is checked against the
    /// branch selected in `state`; shape inference only covers unions with no
    /// selection.
    pub fn validate_with(model: &FieldModel, data: &Value, state: &'s FormState) -> Vec<ValidationError> {
        Self {
            selections: Some(state),
            ..Self::default()
        }
        .run(model, data)
    }

    fn run(mut self, model: &FieldModel, data: &Value) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.check_object(&model.root, Some(data), FieldPath::root(), &mut errors);
        errors
    }

    fn branch_for(&self, union: &FieldDescriptor, address: &FieldPath, value: &Value) -> Option<usize> {
        self.selections
            .and_then(|state| state.branch_selection(address))
            .filter(|branch| *branch < union.children.len())
            .or_else(|| infer_branch(union, value))
    }

    fn check(
        &mut self,
        field: &FieldDescriptor,
        value: Option<&Value>,
        address: FieldPath,
        errors: &mut Vec<ValidationError>,
    ) {
        if is_empty_value(value) {
            if field.required {
                errors.push(ValidationError::new(address, format!("{} is required", field.label)));
            }
            return;
        }
        let Some(value) = value else { return };

        match field.kind {
            FieldKind::Object => self.check_object(field, Some(value), address, errors),
            FieldKind::Array => self.check_array(field, value, address, errors),
            FieldKind::Union => match self.branch_for(field, &address, value) {
                Some(branch) => {
                    let address = address.branch(branch);
                    self.check(&field.children[branch], Some(value), address, errors)
                }
                None => {
                    let names: Vec<&str> = field.children.iter().map(|c| c.label.as_str()).collect();
                    errors.push(ValidationError::new(
                        address,
                        format!("{} must match one of: {}", field.label, names.join(", ")),
                    ));
                }
            },
            FieldKind::Text => self.check_text(field, value, address, errors),
            FieldKind::Number => check_number(field, value, address, errors),
            FieldKind::Boolean => {
                if !value.is_boolean() {
                    errors.push(ValidationError::new(address, format!("{} must be true or false", field.label)));
                }
            }
            FieldKind::Select => check_enum(field, value, address, errors),
            FieldKind::Raw => {}
        }
    }

    fn check_object(
        &mut self,
        field: &FieldDescriptor,
        value: Option<&Value>,
        address: FieldPath,
        errors: &mut Vec<ValidationError>,
    ) {
        let map = match value {
            Some(Value::Object(map)) => Some(map),
            None | Some(Value::Null) => None,
            Some(_) => {
                errors.push(ValidationError::new(address, format!("{} must be an object", field.label)));
                return;
            }
        };
        for child in &field.children {
            let child_value = map.and_then(|m| m.get(&child.name));
            self.check(child, child_value, address.child(&child.name), errors);
        }
    }

    fn check_array(
        &mut self,
        field: &FieldDescriptor,
        value: &Value,
        address: FieldPath,
        errors: &mut Vec<ValidationError>,
    ) {
        let Value::Array(items) = value else {
            errors.push(ValidationError::new(address, format!("{} must be a list", field.label)));
            return;
        };

        let count = items.len() as u64;
        if let Some(min) = field.rules.min_items {
            if count < min {
                errors.push(ValidationError::new(
                    address.clone(),
                    format!("{} must have at least {} items", field.label, min),
                ));
            }
        }
        if let Some(max) = field.rules.max_items {
            if count > max {
                errors.push(ValidationError::new(
                    address.clone(),
                    format!("{} must have at most {} items", field.label, max),
                ));
            }
        }

        if let Some(template) = field.item() {
            for (i, item) in items.iter().enumerate() {
                // An item on display must hold a value
                if is_empty_value(Some(item)) && !(item.is_null() && template.nullable) {
                    errors.push(ValidationError::new(
                        address.index(i),
                        format!("{} item {} is required", field.label, i + 1),
                    ));
                    continue;
                }
                self.check(template, Some(item), address.index(i), errors);
            }
        }
    }

    fn check_text(
        &mut self,
        field: &FieldDescriptor,
        value: &Value,
        address: FieldPath,
        errors: &mut Vec<ValidationError>,
    ) {
        let Value::String(text) = value else {
            errors.push(ValidationError::new(address, format!("{} must be text", field.label)));
            return;
        };

        let length = text.chars().count() as u64;
        if let Some(min) = field.rules.min_length {
            if length < min {
                errors.push(ValidationError::new(
                    address.clone(),
                    format!("{} must be at least {} characters", field.label, min),
                ));
            }
        }
        if let Some(max) = field.rules.max_length {
            if length > max {
                errors.push(ValidationError::new(
                    address.clone(),
                    format!("{} must be at most {} characters", field.label, max),
                ));
            }
        }

        if let Some(pattern) = &field.rules.pattern {
            match self.compiled(pattern) {
                Ok(re) => {
                    if !re.is_match(text) {
                        errors.push(ValidationError::new(
                            address.clone(),
                            format!("{} must match the pattern {}", field.label, pattern),
                        ));
                    }
                }
                Err(reason) => errors.push(ValidationError::new(
                    address.clone(),
                    format!("{} has an invalid pattern: {}", field.label, reason),
                )),
            }
        }

        if !field.rules.enum_values.is_empty() {
            check_enum(field, value, address, errors);
        }
    }

    fn compiled(&mut self, pattern: &str) -> Result<&Regex, String> {
        self.patterns
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(pattern).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| e.clone())
    }
}

fn check_number(field: &FieldDescriptor, value: &Value, address: FieldPath, errors: &mut Vec<ValidationError>) {
    let Some(n) = value.as_f64() else {
        errors.push(ValidationError::new(address, format!("{} must be a number", field.label)));
        return;
    };

    if field.rules.integer && n.fract() != 0.0 {
        errors.push(ValidationError::new(
            address.clone(),
            format!("{} must be a whole number", field.label),
        ));
    }
    if let Some(min) = field.rules.minimum {
        if n < min {
            errors.push(ValidationError::new(
                address.clone(),
                format!("{} must be at least {}", field.label, min),
            ));
        }
    }
    if let Some(max) = field.rules.maximum {
        if n > max {
            errors.push(ValidationError::new(
                address,
                format!("{} must be at most {}", field.label, max),
            ));
        }
    }
}

fn check_enum(field: &FieldDescriptor, value: &Value, address: FieldPath, errors: &mut Vec<ValidationError>) {
    let allowed = &field.rules.enum_values;
    let matches = allowed.iter().any(|a| a == value || numbers_equal(a, value));
    if !matches {
        let options: Vec<String> = field.options.iter().map(|o| o.label.clone()).collect();
        errors.push(ValidationError::new(
            address,
            format!("{} must be one of: {}", field.label, options.join(", ")),
        ));
    }
}

/// `1` and `1.0` are the same enum member
fn numbers_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => a.is_number() && b.is_number() && x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::form::builder::FieldModelBuilder;
    use crate::domain::schema::SchemaDocument;
    use serde_json::json;

    fn model(root: serde_json::Value) -> FieldModel {
        let doc = SchemaDocument::from_value(&json!({ "$defs": { "Root": root } })).unwrap();
        FieldModelBuilder::new(&doc).build_model(None).unwrap()
    }

    fn paths(errors: &[ValidationError]) -> Vec<String> {
        errors.iter().map(|e| e.path.to_string()).collect()
    }

    #[test]
    fn test_required_empty_short_circuits() {
        let m = model(json!({
            "type": "object",
            "required": ["name", "qty", "tags"],
            "properties": {
                "name": { "type": "string", "minLength": 3, "pattern": "^x" },
                "qty": { "type": "number", "minimum": 1 },
                "tags": { "type": "array", "minItems": 2, "items": { "type": "string" } }
            }
        }));

        let errors = Validator::validate(&m, &json!({ "name": "", "qty": null, "tags": [] }));
        assert_eq!(paths(&errors), vec!["name", "qty", "tags"]);
        assert_eq!(errors[0].message, "Name is required");

        let errors = Validator::validate(&m, &json!({}));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_numeric_bounds_inclusive() {
        let m = model(json!({ "type": "object", "properties": {
            "n": { "type": "integer", "minimum": 1, "maximum": 10 }
        } }));

        assert!(Validator::validate(&m, &json!({ "n": 1 })).is_empty());
        assert!(Validator::validate(&m, &json!({ "n": 10 })).is_empty());
        assert_eq!(
            Validator::validate(&m, &json!({ "n": 0 }))[0].message,
            "N must be at least 1"
        );
        assert_eq!(Validator::validate(&m, &json!({ "n": 11 })).len(), 1);
        assert_eq!(
            Validator::validate(&m, &json!({ "n": 2.5 }))[0].message,
            "N must be a whole number"
        );
        assert_eq!(
            Validator::validate(&m, &json!({ "n": "abc" }))[0].message,
            "N must be a number"
        );
    }

    #[test]
    fn test_text_rules() {
        let m = model(json!({ "type": "object", "properties": {
            "code": { "type": "string", "minLength": 2, "maxLength": 4, "pattern": "[0-9]" },
            "bad": { "type": "string", "pattern": "(" }
        } }));

        // Length counts characters and the pattern is unanchored
        assert!(Validator::validate(&m, &json!({ "code": "é1" })).is_empty());
        let errors = Validator::validate(&m, &json!({ "code": "abcde" }));
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("at most 4 characters"));
        assert!(errors[1].message.contains("pattern"));

        let errors = Validator::validate(&m, &json!({ "bad": "x" }));
        assert_eq!(paths(&errors), vec!["bad"]);
        assert!(errors[0].message.contains("invalid pattern"));
    }

    #[test]
    fn test_enum_membership() {
        let m = model(json!({ "type": "object", "properties": {
            "size": { "type": "string", "enum": ["S", "M"] },
            "level": { "type": "integer", "enum": [1, 2] }
        } }));
        assert!(Validator::validate(&m, &json!({ "size": "M", "level": 2 })).is_empty());
        let errors = Validator::validate(&m, &json!({ "size": "XL", "level": 3 }));
        assert_eq!(errors[0].message, "Size must be one of: S, M");
        assert_eq!(paths(&errors), vec!["size", "level"]);
    }

    #[test]
    fn test_nested_errors_aggregate() {
        let m = model(json!({ "type": "object", "properties": {
            "stores": { "type": "array", "maxItems": 1, "items": {
                "type": "object", "required": ["name"],
                "properties": { "name": { "type": "string" }, "size": { "type": "integer", "minimum": 0 } }
            } },
            "owner": { "type": "object", "required": ["email"], "properties": { "email": { "type": "string" } } }
        } }));

        let errors = Validator::validate(&m, &json!({
            "stores": [{ "size": -1 }, { "name": "ok" }]
        }));
        assert_eq!(paths(&errors), vec!["stores", "stores[0].name", "stores[0].size"]);

        // Optional object left out: its required children are not checked
        assert!(Validator::validate(&m, &json!({})).is_empty());
        assert_eq!(paths(&Validator::validate(&m, &json!({ "owner": {} }))), vec!["owner.email"]);
    }

    #[test]
    fn test_union_validation_uses_branch_address() {
        let doc = SchemaDocument::from_value(&json!({ "$defs": {
            "Bike": { "type": "object", "properties": { "gears": { "type": "integer", "maximum": 30 } } },
            "Car": { "type": "object", "required": ["doors"], "properties": { "doors": { "type": "integer" } } },
            "Root": { "type": "object", "properties": { "vehicle": { "anyOf": [{ "$ref": "#/$defs/Bike" }, { "$ref": "#/$defs/Car" }] } } }
        } }))
        .unwrap();
        let m = FieldModelBuilder::new(&doc).build_model(None).unwrap();

        assert_eq!(
            paths(&Validator::validate(&m, &json!({ "vehicle": { "gears": 40 } }))),
            vec!["vehicle@0.gears"]
        );
        let errors = Validator::validate(&m, &json!({ "vehicle": 5 }));
        assert_eq!(errors[0].message, "Vehicle must match one of: Bike, Car");
    }

    #[test]
    fn test_selected_branch_wins_over_shape() {
        let doc = SchemaDocument::from_value(&json!({ "$defs": {
            "Bike": { "type": "object", "properties": { "gears": { "type": "integer" } } },
            "Electric": { "type": "object", "required": ["battery"], "properties": {
                "gears": { "type": "integer" },
                "battery": { "type": "integer", "minimum": 1 }
            } },
            "Root": { "type": "object", "properties": {
                "vehicle": { "oneOf": [{ "$ref": "#/$defs/Bike" }, { "$ref": "#/$defs/Electric" }] }
            } }
        } }))
        .unwrap();
        let m = FieldModelBuilder::new(&doc).build_model(None).unwrap();
        let data = json!({ "vehicle": { "gears": 3 } });

        // Without a selection the shape fits the looser branch
        assert!(Validator::validate(&m, &data).is_empty());

        let mut state = FormState::new();
        state.set(FieldPath::parse("vehicle").unwrap(), "1");
        let errors = Validator::validate_with(&m, &data, &state);
        assert_eq!(paths(&errors), vec!["vehicle@1.battery"]);
        assert_eq!(errors[0].message, "Battery is required");

        // An out of range selection falls back to the shape
        state.set(FieldPath::parse("vehicle").unwrap(), "7");
        assert!(Validator::validate_with(&m, &data, &state).is_empty());
    }

    #[test]
    fn test_blank_items_are_reported_at_their_index() {
        let m = model(json!({ "type": "object", "properties": {
            "tags": { "type": "array", "items": { "type": "string" } },
            "notes": { "type": "array", "items": { "type": ["string", "null"] } }
        } }));

        let errors = Validator::validate(&m, &json!({ "tags": ["a", "", null], "notes": [null, "x"] }));
        assert_eq!(paths(&errors), vec!["tags[1]", "tags[2]"]);
        assert_eq!(errors[0].message, "Tags item 2 is required");
    }
}
