//! Field model builder
//!
//! Walks a resolved schema node and produces the [`FieldDescriptor`] tree.
//! References are expanded lazily through the [`SchemaResolver`], one
//! [`ResolutionChain`] per branch; a cyclic reference degrades to a raw field.

use tracing::{debug, info};

use super::field::{FieldDescriptor, FieldKind, FieldModel, SelectOption, ValidationRules};
use super::path::{FieldPath, PathSegment};
use crate::domain::schema::{
    ArrayNode, NodeKind, ObjectNode, PrimitiveNode, PrimitiveType, Resolved, ResolutionChain,
    SchemaDocument, SchemaError, SchemaNode, SchemaResolver, UnionNode,
};
use crate::domain::text::labelize;

pub struct FieldModelBuilder<'doc> {
    resolver: SchemaResolver<'doc>,
}

impl<'doc> FieldModelBuilder<'doc> {
    pub fn new(document: &'doc SchemaDocument) -> Self {
        Self {
            resolver: SchemaResolver::new(document),
        }
    }

    /// Select the root type and build the whole field model
    pub fn build_model(&self, root_override: Option<&str>) -> Result<FieldModel, SchemaError> {
        let resolved = self.resolver.resolve(root_override)?;
        let mut root = self.build(resolved.node, FieldPath::root(), &resolved.chain)?;
        root.reference = Some(resolved.selection.name.clone());
        root.label = resolved
            .node
            .title
            .clone()
            .unwrap_or_else(|| labelize(&resolved.selection.name));

        info!(
            root = %resolved.selection.name,
            strategy = ?resolved.selection.strategy,
            fields = root.iter().count(),
            "Built field model"
        );

        Ok(FieldModel {
            root,
            selection: resolved.selection,
        })
    }

    /// Build the descriptor for `node` placed at `path`
    pub fn build(
        &self,
        node: &SchemaNode,
        path: FieldPath,
        chain: &ResolutionChain,
    ) -> Result<FieldDescriptor, SchemaError> {
        let name = local_name(&path);

        let mut field = match &node.kind {
            NodeKind::Reference(target) => {
                return self.build_reference(node, target, path, chain);
            }
            NodeKind::Primitive(prim) => self.build_primitive(prim, &name, path),
            NodeKind::Object(obj) => self.build_object(obj, &name, path, chain)?,
            NodeKind::Array(arr) => self.build_array(arr, &name, path, chain)?,
            NodeKind::Union(union) => self.build_union(union, &name, path, chain)?,
            NodeKind::Any => FieldDescriptor::new(&name, path, FieldKind::Raw, labelize(&name)),
        };

        annotate(&mut field, node);
        Ok(field)
    }

    fn build_reference(
        &self,
        node: &SchemaNode,
        target: &str,
        path: FieldPath,
        chain: &ResolutionChain,
    ) -> Result<FieldDescriptor, SchemaError> {
        let mut field = match self.resolver.resolve_ref(target, chain)? {
            Resolved::Node {
                node: resolved,
                chain,
            } => self.build(resolved, path, &chain)?,
            Resolved::Cycle { name } => {
                debug!(path = %path, reference = %name, "Cyclic reference built as raw field");
                let local = local_name(&path);
                let mut raw = FieldDescriptor::new(&local, path, FieldKind::Raw, labelize(&local));
                raw.description = Some(format!("Recursive {} value, entered as JSON", name));
                raw
            }
        };
        if field.reference.is_none() {
            field.reference = Some(target.to_string());
        }
        // Annotations on the referring node override the target's
        annotate(&mut field, node);
        Ok(field)
    }

    fn build_primitive(&self, prim: &PrimitiveNode, name: &str, path: FieldPath) -> FieldDescriptor {
        let kind = if !prim.enum_values.is_empty() {
            FieldKind::Select
        } else {
            match prim.ty {
                PrimitiveType::String => FieldKind::Text,
                PrimitiveType::Number | PrimitiveType::Integer => FieldKind::Number,
                PrimitiveType::Boolean => FieldKind::Boolean,
                PrimitiveType::Null => FieldKind::Raw,
            }
        };

        let mut field = FieldDescriptor::new(name, path, kind, labelize(name));
        field.rules = ValidationRules {
            min_length: prim.min_length,
            max_length: prim.max_length,
            minimum: prim.minimum,
            maximum: prim.maximum,
            pattern: prim.pattern.clone(),
            enum_values: prim.enum_values.clone(),
            integer: prim.ty == PrimitiveType::Integer,
            format: prim.format.clone(),
            ..Default::default()
        };
        field.options = prim.enum_values.iter().map(SelectOption::from_value).collect();
        field
    }

    fn build_object(
        &self,
        obj: &ObjectNode,
        name: &str,
        path: FieldPath,
        chain: &ResolutionChain,
    ) -> Result<FieldDescriptor, SchemaError> {
        // A free-form map below the root has no fixed fields to lay out
        if obj.properties.is_empty() && !path.is_root() {
            return Ok(FieldDescriptor::new(name, path, FieldKind::Raw, labelize(name)));
        }

        let mut field = FieldDescriptor::new(name, path.clone(), FieldKind::Object, labelize(name));
        for (prop_name, prop) in &obj.properties {
            let mut child = self.build(prop, path.child(prop_name), chain)?;
            child.required = obj.required.iter().any(|r| r == prop_name);
            field.children.push(child);
        }
        Ok(field)
    }

    fn build_array(
        &self,
        arr: &ArrayNode,
        name: &str,
        path: FieldPath,
        chain: &ResolutionChain,
    ) -> Result<FieldDescriptor, SchemaError> {
        let mut item = self.build(&arr.items, path.item(), chain)?;
        if item.label == labelize(name) {
            item.label = "Item".to_string();
        }

        let mut field = FieldDescriptor::new(name, path, FieldKind::Array, labelize(name));
        field.rules.min_items = arr.min_items;
        field.rules.max_items = arr.max_items;
        field.children.push(item);
        Ok(field)
    }

    fn build_union(
        &self,
        union: &UnionNode,
        name: &str,
        path: FieldPath,
        chain: &ResolutionChain,
    ) -> Result<FieldDescriptor, SchemaError> {
        let mut field = FieldDescriptor::new(name, path.clone(), FieldKind::Union, labelize(name));
        for (i, variant) in union.variants.iter().enumerate() {
            let mut branch = self.build(variant, path.branch(i), chain)?;
            branch.label = branch_label(variant);
            field.children.push(branch);
        }
        Ok(field)
    }
}

/// Option label of a union branch: the reference name, else the inline
/// node's title or type name
fn branch_label(variant: &SchemaNode) -> String {
    match &variant.kind {
        NodeKind::Reference(name) => name.clone(),
        _ => variant
            .title
            .clone()
            .unwrap_or_else(|| variant.type_name().to_string()),
    }
}

fn annotate(field: &mut FieldDescriptor, node: &SchemaNode) {
    if let Some(title) = &node.title {
        field.label = title.clone();
    }
    if node.description.is_some() {
        field.description = node.description.clone();
    }
    if node.default.is_some() {
        field.default_value = node.default.clone();
    }
    field.nullable |= node.nullable;
}

/// The key a field occupies in its enclosing object
fn local_name(path: &FieldPath) -> String {
    path.segments()
        .iter()
        .rev()
        .find_map(|s| match s {
            PathSegment::Field(name) => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
