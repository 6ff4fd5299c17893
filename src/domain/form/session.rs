//! Interactive editing session over one field model
//!
//! Wraps a [`FormState`] with the editing operations a form UI needs: control
//! edits, array item add/remove, union branch switching, revision prefill and
//! debounced validation driven by an injected [`Clock`].

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::field::{FieldKind, FieldModel};
use super::path::{FieldPath, PathSegment};
use super::render::{item_count, FormRenderer, FormView};
use super::state::{collect, flatten, CollectionMismatchError, FormState};
use super::validator::{ValidationError, Validator};
use crate::domain::clock::Clock;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Mismatch(#[from] CollectionMismatchError),

    #[error("'{address}' is not a {expected} field")]
    WrongKind {
        address: String,
        expected: &'static str,
    },

    #[error("'{address}' already holds the maximum of {max} items")]
    TooManyItems { address: String, max: u64 },

    #[error("'{address}' needs at least {min} items")]
    TooFewItems { address: String, min: u64 },

    #[error("'{address}' has no item {index}")]
    NoSuchItem { address: String, index: usize },

    #[error("'{address}' has no branch {branch}")]
    NoSuchBranch { address: String, branch: usize },

    #[error("'{value}' does not name a branch of '{address}'")]
    InvalidBranch { address: String, value: String },
}

/// Result of a submit: the collected tree and every violation in it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Submission {
    pub data: Value,
    pub errors: Vec<ValidationError>,
}

impl Submission {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct FormSession {
    model: Arc<FieldModel>,
    state: FormState,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    last_edit: Option<DateTime<Utc>>,
    errors: Vec<ValidationError>,
}

impl FormSession {
    /// Start a session with the schema's defaults filled in
    pub fn new(model: Arc<FieldModel>, clock: Arc<dyn Clock>, debounce: Duration) -> Self {
        let state = flatten(&model, &model.default_data());
        Self {
            model,
            state,
            clock,
            debounce,
            last_edit: None,
            errors: Vec::new(),
        }
    }

    pub fn model(&self) -> &FieldModel {
        &self.model
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn view(&self) -> FormView {
        FormRenderer::render(&self.model, &self.state)
    }

    pub fn data(&self) -> Result<Value, CollectionMismatchError> {
        collect(&self.model, &self.state)
    }

    /// Set a control value; on a union address this switches branch
    pub fn set(&mut self, address: &FieldPath, value: &str) -> Result<(), SessionError> {
        let kind = self
            .model
            .descriptor_for(address)
            .map(|f| f.kind)
            .ok_or_else(|| CollectionMismatchError::UnknownField {
                address: address.to_string(),
            })?;

        match kind {
            FieldKind::Union => {
                let branch = value.trim().parse().map_err(|_| SessionError::InvalidBranch {
                    address: address.to_string(),
                    value: value.to_string(),
                })?;
                return self.select_branch(address, branch);
            }
            kind if !kind.is_leaf() => {
                return Err(CollectionMismatchError::NotAControl {
                    address: address.to_string(),
                    kind,
                }
                .into())
            }
            _ => {}
        }

        self.state.set(address.clone(), value);
        self.touch();
        Ok(())
    }

    /// Append an item to an array; returns the new item's index
    pub fn add_item(&mut self, array: &FieldPath) -> Result<usize, SessionError> {
        let field = self.array_field(array)?;
        let count = item_count(field, array, &self.state);
        if let Some(max) = field.rules.max_items {
            if count as u64 >= max {
                return Err(SessionError::TooManyItems {
                    address: array.to_string(),
                    max,
                });
            }
        }
        self.state.item_counts.insert(array.clone(), count + 1);
        self.touch();
        Ok(count)
    }

    /// Remove one item; later items move down one index
    pub fn remove_item(&mut self, array: &FieldPath, index: usize) -> Result<(), SessionError> {
        let field = self.array_field(array)?;
        let count = item_count(field, array, &self.state);
        if index >= count {
            return Err(SessionError::NoSuchItem {
                address: array.to_string(),
                index,
            });
        }
        if let Some(min) = field.rules.min_items {
            if count as u64 <= min {
                return Err(SessionError::TooFewItems {
                    address: array.to_string(),
                    min,
                });
            }
        }

        let depth = array.depth();
        let values = std::mem::take(&mut self.state.values);
        self.state.values = values
            .into_iter()
            .filter_map(|(addr, v)| reindex(array, depth, index, addr).map(|a| (a, v)))
            .collect();
        let counts = std::mem::take(&mut self.state.item_counts);
        self.state.item_counts = counts
            .into_iter()
            .filter_map(|(addr, c)| reindex(array, depth, index, addr).map(|a| (a, c)))
            .collect();
        self.state.item_counts.insert(array.clone(), count - 1);

        self.touch();
        Ok(())
    }

    /// Switch a union's branch, discarding everything entered under it
    pub fn select_branch(&mut self, union: &FieldPath, branch: usize) -> Result<(), SessionError> {
        let field = self
            .model
            .descriptor_for(union)
            .filter(|f| f.kind == FieldKind::Union)
            .ok_or_else(|| SessionError::WrongKind {
                address: union.to_string(),
                expected: "union",
            })?;
        if branch >= field.children.len() {
            return Err(SessionError::NoSuchBranch {
                address: union.to_string(),
                branch,
            });
        }

        if self.state.selected_branch(union) != branch {
            debug!(union = %union, branch, "Switching union branch");
            self.state.clear_under(union);
        }
        self.state.set(union.clone(), branch.to_string());
        self.touch();
        Ok(())
    }

    /// Replace the form contents with a previously saved data tree
    pub fn load_revision(&mut self, data: &Value) {
        self.state = flatten(&self.model, data);
        self.last_edit = None;
        self.errors.clear();
    }

    /// Run validation once the edits have been quiet for the debounce period.
    ///
    /// Returns the fresh errors when a pass ran, `None` while edits are still
    /// settling or nothing changed.
    pub fn poll_validation(&mut self) -> Option<&[ValidationError]> {
        let last_edit = self.last_edit?;
        if self.clock.now() - last_edit < self.debounce {
            return None;
        }
        self.last_edit = None;
        self.errors = match self.data() {
            Ok(data) => Validator::validate_with(&self.model, &data, &self.state),
            Err(e) => vec![ValidationError::new(FieldPath::root(), e.to_string())],
        };
        Some(self.errors.as_slice())
    }

    /// Collect and fully validate, bypassing the debounce
    pub fn submit(&mut self) -> Result<Submission, CollectionMismatchError> {
        let data = self.data()?;
        let errors = Validator::validate_with(&self.model, &data, &self.state);
        self.errors = errors.clone();
        self.last_edit = None;
        Ok(Submission { data, errors })
    }

    fn array_field(&self, array: &FieldPath) -> Result<&super::field::FieldDescriptor, SessionError> {
        self.model
            .descriptor_for(array)
            .filter(|f| f.kind == FieldKind::Array)
            .ok_or_else(|| SessionError::WrongKind {
                address: array.to_string(),
                expected: "list",
            })
    }

    fn touch(&mut self) {
        self.last_edit = Some(self.clock.now());
    }
}

/// Address after removing item `removed` from `array`; `None` for addresses
/// inside the removed item
fn reindex(array: &FieldPath, depth: usize, removed: usize, addr: FieldPath) -> Option<FieldPath> {
    if !array.is_strict_prefix_of(&addr) {
        return Some(addr);
    }
    match addr.segments().get(depth) {
        Some(PathSegment::Index(i)) if *i == removed => None,
        Some(PathSegment::Index(i)) if *i > removed => {
            let mut segments = addr.segments().to_vec();
            segments[depth] = PathSegment::Index(i - 1);
            Some(FieldPath::from_segments(segments))
        }
        _ => Some(addr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::form::builder::FieldModelBuilder;
    use crate::domain::schema::SchemaDocument;
    use serde_json::json;

    fn session() -> (FormSession, Arc<ManualClock>) {
        let doc = SchemaDocument::from_value(&json!({ "$defs": {
            "Bike": { "type": "object", "properties": { "gears": { "type": "integer" } } },
            "Road": { "type": "object", "properties": { "speed": { "type": "number" } } },
            "Root": { "type": "object", "required": ["name"], "properties": {
                "name": { "type": "string", "minLength": 3 },
                "stores": { "type": "array", "maxItems": 3, "items": { "type": "object", "properties": {
                    "city": { "type": "string" }
                } } },
                "vehicle": { "oneOf": [{ "$ref": "#/$defs/Bike" }, { "$ref": "#/$defs/Road" }] }
            } }
        } }))
        .unwrap();
        let model = Arc::new(FieldModelBuilder::new(&doc).build_model(None).unwrap());
        let clock = Arc::new(ManualClock::default());
        let session = FormSession::new(model, clock.clone(), Duration::milliseconds(300));
        (session, clock)
    }

    fn p(s: &str) -> FieldPath {
        FieldPath::parse(s).unwrap()
    }

    #[test]
    fn test_switching_branch_clears_previous_values() {
        let (mut s, _) = session();
        s.set(&p("vehicle"), "0").unwrap();
        s.set(&p("vehicle@0.gears"), "21").unwrap();
        assert_eq!(s.data().unwrap(), json!({ "vehicle": { "gears": 21 } }));

        s.select_branch(&p("vehicle"), 1).unwrap();
        assert_eq!(s.state().get(&p("vehicle@0.gears")), None);
        s.set(&p("vehicle@1.speed"), "32.5").unwrap();
        assert_eq!(s.data().unwrap(), json!({ "vehicle": { "speed": 32.5 } }));

        // Switching back does not resurrect the old values
        s.set(&p("vehicle"), "0").unwrap();
        assert_eq!(s.data().unwrap(), json!({}));
        assert!(matches!(
            s.select_branch(&p("vehicle"), 5),
            Err(SessionError::NoSuchBranch { branch: 5, .. })
        ));
    }

    #[test]
    fn test_add_and_remove_items_reindex() {
        let (mut s, _) = session();
        let stores = p("stores");
        assert_eq!(s.add_item(&stores).unwrap(), 1);
        assert_eq!(s.add_item(&stores).unwrap(), 2);
        assert!(matches!(s.add_item(&stores), Err(SessionError::TooManyItems { max: 3, .. })));

        s.set(&p("stores[0].city"), "A").unwrap();
        s.set(&p("stores[1].city"), "B").unwrap();
        s.set(&p("stores[2].city"), "C").unwrap();

        s.remove_item(&stores, 1).unwrap();
        assert_eq!(s.data().unwrap(), json!({ "stores": [{ "city": "A" }, { "city": "C" }] }));
        assert_eq!(s.state().get(&p("stores[1].city")), Some("C"));
        assert_eq!(s.view().controls[1].children.len(), 2);

        assert!(matches!(s.remove_item(&stores, 7), Err(SessionError::NoSuchItem { .. })));
        assert!(matches!(s.add_item(&p("name")), Err(SessionError::WrongKind { .. })));
    }

    #[test]
    fn test_debounced_validation() {
        let (mut s, clock) = session();
        assert!(s.poll_validation().is_none());

        s.set(&p("name"), "ab").unwrap();
        clock.advance(Duration::milliseconds(100));
        assert!(s.poll_validation().is_none());

        // Another edit restarts the quiet period
        s.set(&p("name"), "a").unwrap();
        clock.advance(Duration::milliseconds(250));
        assert!(s.poll_validation().is_none());

        clock.advance(Duration::milliseconds(50));
        let errors = s.poll_validation().unwrap().to_vec();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, p("name"));
        assert!(s.poll_validation().is_none());
    }

    #[test]
    fn test_load_revision_and_submit() {
        let (mut s, _) = session();
        s.load_revision(&json!({
            "name": "Corner shop",
            "stores": [{ "city": "Oslo" }],
            "vehicle": { "speed": 20 },
            "retired": true
        }));
        assert_eq!(s.state().get(&p("vehicle")), Some("1"));

        let submission = s.submit().unwrap();
        assert!(submission.is_valid());
        assert_eq!(
            submission.data,
            json!({ "name": "Corner shop", "stores": [{ "city": "Oslo" }], "vehicle": { "speed": 20.0 } })
        );

        s.set(&p("name"), "").unwrap();
        let submission = s.submit().unwrap();
        assert_eq!(submission.errors.len(), 1);
        assert_eq!(s.errors().len(), 1);
    }

    #[test]
    fn test_set_rejects_unknown_and_container_addresses() {
        let (mut s, _) = session();
        assert!(matches!(
            s.set(&p("nope"), "x"),
            Err(SessionError::Mismatch(CollectionMismatchError::UnknownField { .. }))
        ));
        assert!(matches!(
            s.set(&p("stores"), "x"),
            Err(SessionError::Mismatch(CollectionMismatchError::NotAControl { .. }))
        ));
    }

    #[test]
    fn test_submit_checks_selected_branch_and_blank_items() {
        let doc = SchemaDocument::from_value(&json!({ "$defs": {
            "Bike": { "type": "object", "properties": { "gears": { "type": "integer" } } },
            "Electric": { "type": "object", "required": ["battery"], "properties": {
                "gears": { "type": "integer" },
                "battery": { "type": "integer" }
            } },
            "Root": { "type": "object", "properties": {
                "vehicle": { "oneOf": [{ "$ref": "#/$defs/Bike" }, { "$ref": "#/$defs/Electric" }] },
                "stores": { "type": "array", "items": { "type": "object", "required": ["name"], "properties": {
                    "name": { "type": "string" },
                    "city": { "type": "string" }
                } } }
            } }
        } }))
        .unwrap();
        let model = Arc::new(FieldModelBuilder::new(&doc).build_model(None).unwrap());
        let clock = Arc::new(ManualClock::default());
        let mut s = FormSession::new(model, clock.clone(), Duration::milliseconds(300));

        s.select_branch(&p("vehicle"), 1).unwrap();
        s.set(&p("vehicle@1.gears"), "3").unwrap();
        assert_eq!(s.add_item(&p("stores")).unwrap(), 1);
        s.set(&p("stores[1].city"), "Oslo").unwrap();

        let submission = s.submit().unwrap();
        assert_eq!(
            submission.data,
            json!({ "vehicle": { "gears": 3 }, "stores": [{}, { "city": "Oslo" }] })
        );
        let paths: Vec<String> = submission.errors.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["vehicle@1.battery", "stores[0].name", "stores[1].name"]);

        // The debounced pass sees the same selection
        s.set(&p("vehicle@1.battery"), "80").unwrap();
        clock.advance(Duration::milliseconds(300));
        let errors = s.poll_validation().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.path.to_string().starts_with("stores[")));
    }
}
