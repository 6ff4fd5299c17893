//! Field descriptors: the renderable, validatable unit of a form

use serde::Serialize;
use serde_json::Value;

use super::path::{FieldPath, PathSegment};
use crate::domain::schema::RootSelection;

/// How a field is presented and collected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Select,
    Array,
    Object,
    Union,
    /// Freeform text parsed as structured data on collection
    Raw,
}

impl FieldKind {
    /// Kinds that own exactly one input control
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Number | FieldKind::Boolean | FieldKind::Select | FieldKind::Raw
        )
    }
}

/// Constraints copied from the schema node
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    /// Numbers must be whole
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub integer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

impl SelectOption {
    pub fn from_value(value: &Value) -> Self {
        Self {
            value: value.clone(),
            label: display_value(value),
        }
    }
}

/// Text shown for a scalar value in controls and option lists
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldDescriptor {
    /// Local key in the enclosing object
    pub name: String,
    /// Template address from the form root (`[]` for array items, `@n` for
    /// union branches)
    pub path: FieldPath,
    pub kind: FieldKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub nullable: bool,
    pub rules: ValidationRules,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Schema type name this field was expanded from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Object properties, the array item template, or union branches
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldDescriptor>,
}

impl FieldDescriptor {
    pub fn new(name: &str, path: FieldPath, kind: FieldKind, label: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            kind,
            label,
            description: None,
            required: false,
            nullable: false,
            rules: ValidationRules::default(),
            default_value: None,
            options: Vec::new(),
            reference: None,
            children: Vec::new(),
        }
    }

    /// The array item template
    pub fn item(&self) -> Option<&FieldDescriptor> {
        match self.kind {
            FieldKind::Array => self.children.first(),
            _ => None,
        }
    }

    pub fn branch(&self, idx: usize) -> Option<&FieldDescriptor> {
        match self.kind {
            FieldKind::Union => self.children.get(idx),
            _ => None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&FieldDescriptor> {
        match self.kind {
            FieldKind::Object => self.children.iter().find(|c| c.name == name),
            _ => None,
        }
    }

    /// Depth-first walk over this descriptor and all of its descendants
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    /// Descendant at a template path
    pub fn find(&self, path: &FieldPath) -> Option<&FieldDescriptor> {
        let mut current = self;
        if !self.path.contains(path) {
            return None;
        }
        for segment in &path.segments()[self.path.depth()..] {
            current = match segment {
                PathSegment::Field(name) => current.child(name)?,
                PathSegment::Item => current.item()?,
                PathSegment::Branch(idx) => current.branch(*idx)?,
                PathSegment::Index(_) => return None,
            };
        }
        Some(current)
    }
}

/// Field tree built from one schema load.
///
/// Never mutated: a reload or revision switch builds a new model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldModel {
    pub root: FieldDescriptor,
    pub selection: RootSelection,
}

impl FieldModel {
    /// Descriptor at a template path
    pub fn find(&self, path: &FieldPath) -> Option<&FieldDescriptor> {
        self.root.find(path)
    }

    /// Descriptor owning a concrete control address
    pub fn descriptor_for(&self, address: &FieldPath) -> Option<&FieldDescriptor> {
        self.root.find(&address.to_template())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.root.iter()
    }

    /// Data tree holding every non-empty default declared by the schema
    pub fn default_data(&self) -> Value {
        default_of(&self.root).unwrap_or_else(|| Value::Object(Default::default()))
    }
}

/// undefined, null, `""` and `[]` all count as empty
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn default_of(field: &FieldDescriptor) -> Option<Value> {
    match field.kind {
        FieldKind::Object => {
            let mut map = match &field.default_value {
                Some(Value::Object(map)) => map.clone(),
                _ => Default::default(),
            };
            for child in &field.children {
                if let Some(value) = default_of(child) {
                    map.insert(child.name.clone(), value);
                }
            }
            (!map.is_empty()).then_some(Value::Object(map))
        }
        _ => field
            .default_value
            .clone()
            .filter(|v| !is_empty_value(Some(v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(parent: &FieldPath, name: &str, kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor::new(name, parent.child(name), kind, name.to_string())
    }

    fn sample() -> FieldDescriptor {
        let root = FieldPath::root();
        let mut store = FieldDescriptor::new("stores", root.child("stores"), FieldKind::Array, "Stores".into());
        let mut item = FieldDescriptor::new("stores", root.child("stores").item(), FieldKind::Object, "Item".into());
        item.children.push(leaf(&item.path.clone(), "name", FieldKind::Text));
        store.children.push(item);

        let mut obj = FieldDescriptor::new("", root.clone(), FieldKind::Object, String::new());
        let mut title = leaf(&root, "title", FieldKind::Text);
        title.default_value = Some(json!("Hello"));
        let mut empty = leaf(&root, "notes", FieldKind::Text);
        empty.default_value = Some(json!(""));
        obj.children.push(title);
        obj.children.push(empty);
        obj.children.push(store);
        obj
    }

    #[test]
    fn test_find_and_iter() {
        let root = sample();
        let name = root.find(&FieldPath::parse("stores[].name").unwrap()).unwrap();
        assert_eq!(name.kind, FieldKind::Text);
        assert!(root.find(&FieldPath::parse("stores[0].name").unwrap()).is_none());
        assert!(root.find(&FieldPath::parse("missing").unwrap()).is_none());

        let order: Vec<String> = root.iter().map(|f| f.path.to_string()).collect();
        assert_eq!(order, vec!["", "title", "notes", "stores", "stores[]", "stores[].name"]);
    }

    #[test]
    fn test_default_data_skips_empty_defaults() {
        let model = FieldModel {
            root: sample(),
            selection: RootSelection {
                name: "Root".into(),
                strategy: crate::domain::schema::RootStrategy::Canonical,
                candidates: vec!["Root".into()],
            },
        };
        assert_eq!(model.default_data(), json!({ "title": "Hello" }));
        assert_eq!(
            model.descriptor_for(&FieldPath::parse("stores[4].name").unwrap()).map(|f| f.kind),
            Some(FieldKind::Text)
        );
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&json!(null))));
        assert!(is_empty_value(Some(&json!(""))));
        assert!(is_empty_value(Some(&json!([]))));
        assert!(!is_empty_value(Some(&json!(0))));
        assert!(!is_empty_value(Some(&json!(false))));
        assert!(!is_empty_value(Some(&json!({}))));
    }
}
