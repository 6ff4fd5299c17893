//! Schema documents and their type nodes
//!
//! Parses a JSON-Schema-like document into an arena of named [`SchemaNode`]s.
//! References stay unresolved here; [`super::SchemaResolver`] expands them
//! lazily while the field model is built.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::error::SchemaError;

/// Reserved reference name for the document's own top-level body (`"$ref": "#"`)
pub const INLINE_ROOT_REF: &str = "#";

/// Keys that mark the top-level document as a schema body in its own right
const BODY_KEYWORDS: [&str; 8] = [
    "type", "properties", "$ref", "anyOf", "oneOf", "allOf", "items", "enum",
];

// ============================================================================
// Type Nodes
// ============================================================================

/// A single type node, as declared (references unresolved)
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    /// Declared as `T | null`
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Primitive(PrimitiveNode),
    Object(ObjectNode),
    Array(ArrayNode),
    /// Name of a type in the document arena
    Reference(String),
    Union(UnionNode),
    /// Unconstrained value (`{}` or `true`)
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl PrimitiveType {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Null => "null",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(PrimitiveType::String),
            "number" => Some(PrimitiveType::Number),
            "integer" => Some(PrimitiveType::Integer),
            "boolean" => Some(PrimitiveType::Boolean),
            "null" => Some(PrimitiveType::Null),
            _ => None,
        }
    }

    fn of_value(value: &Value) -> Self {
        match value {
            Value::Bool(_) => PrimitiveType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => PrimitiveType::Integer,
            Value::Number(_) => PrimitiveType::Number,
            Value::Null => PrimitiveType::Null,
            _ => PrimitiveType::String,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveNode {
    pub ty: PrimitiveType,
    pub enum_values: Vec<Value>,
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
}

impl PrimitiveNode {
    pub fn of_type(ty: PrimitiveType) -> Self {
        Self {
            ty,
            enum_values: Vec::new(),
            format: None,
            pattern: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectNode {
    /// Declared property order drives form layout
    pub properties: IndexMap<String, SchemaNode>,
    pub required: Vec<String>,
    /// Schema of free-form extra keys (`additionalProperties: {...}`)
    pub additional: Option<Box<SchemaNode>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayNode {
    pub items: Box<SchemaNode>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnionKind {
    OneOf,
    AnyOf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnionNode {
    pub kind: UnionKind,
    pub variants: Vec<SchemaNode>,
}

impl SchemaNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            title: None,
            description: None,
            default: None,
            nullable: false,
        }
    }

    /// Short type name, used for union option labels and error messages
    pub fn type_name(&self) -> &str {
        match &self.kind {
            NodeKind::Primitive(p) => p.ty.name(),
            NodeKind::Object(_) => "object",
            NodeKind::Array(_) => "array",
            NodeKind::Reference(name) => name,
            NodeKind::Union(_) => "union",
            NodeKind::Any => "any",
        }
    }

    /// Parse a schema node from its JSON form
    pub fn from_value(value: &Value, location: &str) -> Result<Self, SchemaError> {
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Bool(true) => return Ok(SchemaNode::new(NodeKind::Any)),
            other => {
                return Err(SchemaError::malformed(
                    location,
                    format!("expected a schema object, found {}", json_kind(other)),
                ))
            }
        };

        let mut node = parse_kind(obj, location)?;

        // Outer annotations win over the ones carried by collapsed inner nodes
        if let Some(title) = obj.get("title").and_then(Value::as_str) {
            node.title = Some(title.to_string());
        }
        if let Some(desc) = obj.get("description").and_then(Value::as_str) {
            node.description = Some(desc.to_string());
        }
        if let Some(default) = obj.get("default") {
            node.default = Some(default.clone());
        }
        Ok(node)
    }
}

fn parse_kind(obj: &Map<String, Value>, location: &str) -> Result<SchemaNode, SchemaError> {
    if let Some(reference) = obj.get("$ref") {
        let reference = reference
            .as_str()
            .ok_or_else(|| SchemaError::malformed(location, "$ref must be a string"))?;
        return Ok(SchemaNode::new(NodeKind::Reference(reference_name(reference, location)?)));
    }

    if let Some(all_of) = obj.get("allOf").and_then(Value::as_array) {
        if all_of.len() == 1 {
            return SchemaNode::from_value(&all_of[0], &format!("{}/allOf/0", location));
        }
        return Err(SchemaError::malformed(
            location,
            "allOf with more than one member is not supported",
        ));
    }

    for (keyword, kind) in [("oneOf", UnionKind::OneOf), ("anyOf", UnionKind::AnyOf)] {
        if let Some(members) = obj.get(keyword) {
            let members = members.as_array().ok_or_else(|| {
                SchemaError::malformed(location, format!("{} must be an array", keyword))
            })?;
            return parse_union(members, kind, &format!("{}/{}", location, keyword));
        }
    }

    if let Some(constant) = obj.get("const") {
        let mut prim = PrimitiveNode::of_type(PrimitiveType::of_value(constant));
        prim.enum_values = vec![constant.clone()];
        return Ok(SchemaNode::new(NodeKind::Primitive(prim)));
    }

    let (declared, nullable) = declared_type(obj, location)?;
    let declared = match declared {
        Some(t) => t,
        None if obj.contains_key("enum") => {
            let first = obj
                .get("enum")
                .and_then(Value::as_array)
                .and_then(|values| values.first());
            first
                .map(|v| PrimitiveType::of_value(v).name().to_string())
                .unwrap_or_else(|| "string".to_string())
        }
        None if obj.contains_key("properties") || obj.contains_key("additionalProperties") => {
            "object".to_string()
        }
        None if obj.contains_key("items") => "array".to_string(),
        None => {
            let mut node = SchemaNode::new(NodeKind::Any);
            node.nullable = nullable;
            return Ok(node);
        }
    };

    let kind = match declared.as_str() {
        "object" => NodeKind::Object(parse_object(obj, location)?),
        "array" => NodeKind::Array(parse_array(obj, location)?),
        other => match PrimitiveType::from_name(other) {
            Some(ty) => NodeKind::Primitive(parse_primitive(obj, ty, location)?),
            None => {
                return Err(SchemaError::malformed(
                    location,
                    format!("unknown type '{}'", other),
                ))
            }
        },
    };

    let mut node = SchemaNode::new(kind);
    node.nullable = nullable;
    Ok(node)
}

/// `type` as a string or a `[T, "null"]` list
fn declared_type(
    obj: &Map<String, Value>,
    location: &str,
) -> Result<(Option<String>, bool), SchemaError> {
    match obj.get("type") {
        None => Ok((None, false)),
        Some(Value::String(s)) => Ok((Some(s.clone()), false)),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            let nullable = names.contains(&"null");
            let non_null: Vec<&str> = names.iter().copied().filter(|t| *t != "null").collect();
            match non_null.as_slice() {
                [] if nullable => Ok((Some("null".to_string()), false)),
                [single] => Ok((Some(single.to_string()), nullable)),
                _ => Err(SchemaError::malformed(
                    location,
                    "type lists with more than one non-null type are not supported",
                )),
            }
        }
        Some(other) => Err(SchemaError::malformed(
            location,
            format!("type must be a string, found {}", json_kind(other)),
        )),
    }
}

fn parse_union(
    members: &[Value],
    kind: UnionKind,
    location: &str,
) -> Result<SchemaNode, SchemaError> {
    let mut variants = Vec::with_capacity(members.len());
    for (i, member) in members.iter().enumerate() {
        variants.push(SchemaNode::from_value(member, &format!("{}/{}", location, i))?);
    }

    let is_null = |n: &SchemaNode| {
        matches!(&n.kind, NodeKind::Primitive(p) if p.ty == PrimitiveType::Null && p.enum_values.is_empty())
    };
    let had_null = variants.iter().any(is_null);
    let mut non_null: Vec<SchemaNode> = variants.iter().filter(|v| !is_null(v)).cloned().collect();

    // Optional[T] is T, not a union
    if had_null && non_null.len() == 1 {
        let mut single = non_null.remove(0);
        single.nullable = true;
        return Ok(single);
    }

    if variants.is_empty() {
        return Err(SchemaError::malformed(location, "union without members"));
    }

    let mut node = SchemaNode::new(NodeKind::Union(UnionNode { kind, variants }));
    node.nullable = had_null;
    Ok(node)
}

fn parse_object(obj: &Map<String, Value>, location: &str) -> Result<ObjectNode, SchemaError> {
    let mut properties = IndexMap::new();
    if let Some(props) = obj.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| SchemaError::malformed(location, "properties must be an object"))?;
        for (name, prop) in props {
            if name.is_empty() {
                return Err(SchemaError::malformed(location, "property names must not be empty"));
            }
            let child_location = format!("{}/properties/{}", location, name);
            properties.insert(name.clone(), SchemaNode::from_value(prop, &child_location)?);
        }
    }

    let required = match obj.get("required") {
        None => Vec::new(),
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::malformed(location, "required must list property names")
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(SchemaError::malformed(location, "required must be an array")),
    };

    let additional = match obj.get("additionalProperties") {
        Some(Value::Object(_)) => {
            let value = obj.get("additionalProperties").unwrap_or(&Value::Null);
            Some(Box::new(SchemaNode::from_value(
                value,
                &format!("{}/additionalProperties", location),
            )?))
        }
        _ => None,
    };

    Ok(ObjectNode {
        properties,
        required,
        additional,
    })
}

fn parse_array(obj: &Map<String, Value>, location: &str) -> Result<ArrayNode, SchemaError> {
    let items = match obj.get("items") {
        Some(items) => SchemaNode::from_value(items, &format!("{}/items", location))?,
        None => SchemaNode::new(NodeKind::Any),
    };
    Ok(ArrayNode {
        items: Box::new(items),
        min_items: obj.get("minItems").and_then(Value::as_u64),
        max_items: obj.get("maxItems").and_then(Value::as_u64),
    })
}

fn parse_primitive(
    obj: &Map<String, Value>,
    ty: PrimitiveType,
    location: &str,
) -> Result<PrimitiveNode, SchemaError> {
    let enum_values = match obj.get("enum") {
        None => Vec::new(),
        Some(Value::Array(values)) => values.clone(),
        Some(_) => return Err(SchemaError::malformed(location, "enum must be an array")),
    };
    Ok(PrimitiveNode {
        ty,
        enum_values,
        format: obj.get("format").and_then(Value::as_str).map(String::from),
        pattern: obj.get("pattern").and_then(Value::as_str).map(String::from),
        minimum: obj.get("minimum").and_then(Value::as_f64),
        maximum: obj.get("maximum").and_then(Value::as_f64),
        min_length: obj.get("minLength").and_then(Value::as_u64),
        max_length: obj.get("maxLength").and_then(Value::as_u64),
    })
}

/// Type name referenced by a `$ref` value
fn reference_name(reference: &str, location: &str) -> Result<String, SchemaError> {
    if reference == "#" {
        return Ok(INLINE_ROOT_REF.to_string());
    }
    let name = if let Some(pointer) = reference.strip_prefix("#/") {
        pointer.rsplit('/').next().unwrap_or(pointer)
    } else {
        reference
    };
    if name.is_empty() {
        return Err(SchemaError::malformed(location, format!("invalid $ref '{}'", reference)));
    }
    Ok(name.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Named type definitions plus an optional inline root body.
///
/// Immutable once parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaDocument {
    definitions: IndexMap<String, SchemaNode>,
    inline_root: Option<SchemaNode>,
}

impl SchemaDocument {
    /// Parse a document from its JSON form.
    ///
    /// Definitions are read from `$defs` and `definitions` in declared
    /// order; if the top level carries a schema body of its own it becomes
    /// the inline root.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let obj = value.as_object().ok_or_else(|| {
            SchemaError::malformed("#", format!("document must be an object, found {}", json_kind(value)))
        })?;

        let mut definitions = IndexMap::new();
        for key in ["$defs", "definitions"] {
            let Some(defs) = obj.get(key) else { continue };
            let defs = defs
                .as_object()
                .ok_or_else(|| SchemaError::malformed(format!("#/{}", key), "must be an object"))?;
            for (name, def) in defs {
                let location = format!("#/{}/{}", key, name);
                definitions.insert(name.clone(), SchemaNode::from_value(def, &location)?);
            }
        }

        let inline_root = if BODY_KEYWORDS.iter().any(|k| obj.contains_key(*k)) {
            Some(SchemaNode::from_value(value, "#")?)
        } else {
            None
        };

        if definitions.is_empty() && inline_root.is_none() {
            return Err(SchemaError::NoDefinitions);
        }

        Ok(Self {
            definitions,
            inline_root,
        })
    }

    pub fn from_definitions(definitions: IndexMap<String, SchemaNode>) -> Self {
        Self {
            definitions,
            inline_root: None,
        }
    }

    /// Look up a type by name; `#` addresses the inline root
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        if name == INLINE_ROOT_REF {
            return self.inline_root.as_ref();
        }
        self.definitions.get(name)
    }

    pub fn inline_root(&self) -> Option<&SchemaNode> {
        self.inline_root.as_ref()
    }

    /// Definition names in declared order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.inline_root.is_none()
    }
}
