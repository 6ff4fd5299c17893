//! Schema documents, reference resolution and root selection

pub mod document;
pub mod error;
pub mod resolver;

pub use document::{
    ArrayNode, NodeKind, ObjectNode, PrimitiveNode, PrimitiveType, SchemaDocument, SchemaNode,
    UnionKind, UnionNode, INLINE_ROOT_REF,
};
pub use error::SchemaError;
pub use resolver::{
    ResolutionChain, Resolved, ResolvedRoot, RootSelection, RootStrategy, SchemaResolver,
    CANONICAL_ROOT, ROOT_NAME_KEYWORDS,
};
