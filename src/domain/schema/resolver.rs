//! Reference resolution and root selection
//!
//! Resolution is lazy: the resolver only follows a reference when asked, and
//! every branch of the descent carries its own [`ResolutionChain`]. A name
//! that reappears in its own chain resolves to [`Resolved::Cycle`] instead of
//! being expanded again.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::document::{NodeKind, SchemaDocument, SchemaNode, INLINE_ROOT_REF};
use super::error::SchemaError;
use crate::domain::text::split_words;

/// Definition name that is always taken as the root when present
pub const CANONICAL_ROOT: &str = "Root";

/// Name words that mark a definition as root-like, strongest first
pub const ROOT_NAME_KEYWORDS: [&str; 4] = ["root", "main", "input", "request"];

/// Which rule picked the root type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootStrategy {
    /// Named by the caller
    Explicit,
    /// The document's own top-level body
    InlineRoot,
    /// A definition named [`CANONICAL_ROOT`]
    Canonical,
    /// A definition whose name contains a [`ROOT_NAME_KEYWORDS`] word
    NamingHeuristic,
    /// First definition in declared order
    FirstDefined,
}

/// Outcome of root selection, reported so callers can offer an override
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSelection {
    pub name: String,
    pub strategy: RootStrategy,
    /// Every definition the winning rule matched (more than one means the
    /// choice was a guess)
    pub candidates: Vec<String>,
}

impl RootSelection {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Reference names currently being expanded along one branch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionChain {
    names: Vec<String>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn extended(&self, name: &str) -> Self {
        let mut names = self.names.clone();
        names.push(name.to_string());
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Innermost reference name, if any
    pub fn current(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }
}

/// Result of following a reference
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved<'doc> {
    /// The referenced node, with the chain extended by every name followed
    Node {
        node: &'doc SchemaNode,
        chain: ResolutionChain,
    },
    /// Terminal marker: `name` is already being expanded on this branch
    Cycle { name: String },
}

/// The selected root type, ready for the field model builder
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRoot<'doc> {
    pub node: &'doc SchemaNode,
    pub selection: RootSelection,
    pub chain: ResolutionChain,
}

pub struct SchemaResolver<'doc> {
    document: &'doc SchemaDocument,
}

impl<'doc> SchemaResolver<'doc> {
    pub fn new(document: &'doc SchemaDocument) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &'doc SchemaDocument {
        self.document
    }

    /// Select the root type and check that it is a resolvable object.
    ///
    /// References reachable from the root are checked for existence up front
    /// so that a dangling name fails the load instead of a later descent.
    pub fn resolve(&self, root_override: Option<&str>) -> Result<ResolvedRoot<'doc>, SchemaError> {
        let selection = self.select_root(root_override)?;

        match selection.strategy {
            RootStrategy::NamingHeuristic if selection.is_ambiguous() => warn!(
                root = %selection.name,
                candidates = ?selection.candidates,
                "Root type guessed from several root-like names; pass an explicit root to override"
            ),
            strategy => debug!(root = %selection.name, ?strategy, "Selected root type"),
        }

        let (node, chain) = match self.resolve_ref(&selection.name, &ResolutionChain::new())? {
            Resolved::Node { node, chain } => (node, chain),
            Resolved::Cycle { .. } => {
                return Err(SchemaError::CyclicRoot {
                    name: selection.name.clone(),
                })
            }
        };

        if !matches!(node.kind, NodeKind::Object(_)) {
            return Err(SchemaError::NonObjectRoot {
                name: selection.name.clone(),
                found: node.type_name().to_string(),
            });
        }

        self.check_references(node)?;

        Ok(ResolvedRoot {
            node,
            selection,
            chain,
        })
    }

    /// Follow a reference by name.
    ///
    /// Aliases (a definition that is itself a bare reference) are followed
    /// until a concrete node is reached; every name passed is pushed onto the
    /// returned chain.
    pub fn resolve_ref(
        &self,
        name: &str,
        chain: &ResolutionChain,
    ) -> Result<Resolved<'doc>, SchemaError> {
        let mut chain = chain.clone();
        let mut current = name.to_string();

        loop {
            if chain.contains(&current) {
                debug!(reference = %current, "Cyclic reference reached");
                return Ok(Resolved::Cycle { name: current });
            }
            let node = self
                .document
                .get(&current)
                .ok_or_else(|| SchemaError::DanglingReference {
                    name: current.clone(),
                })?;
            chain = chain.extended(&current);

            match &node.kind {
                NodeKind::Reference(next) => current = next.clone(),
                _ => return Ok(Resolved::Node { node, chain }),
            }
        }
    }

    fn select_root(&self, root_override: Option<&str>) -> Result<RootSelection, SchemaError> {
        if let Some(name) = root_override {
            if self.document.get(name).is_none() {
                return Err(SchemaError::UnknownRoot {
                    name: name.to_string(),
                });
            }
            return Ok(single(name, RootStrategy::Explicit));
        }

        if self.document.inline_root().is_some() {
            return Ok(single(INLINE_ROOT_REF, RootStrategy::InlineRoot));
        }

        if self.document.get(CANONICAL_ROOT).is_some() {
            return Ok(single(CANONICAL_ROOT, RootStrategy::Canonical));
        }

        for keyword in ROOT_NAME_KEYWORDS {
            let candidates: Vec<String> = self
                .document
                .names()
                .filter(|name| {
                    split_words(name)
                        .iter()
                        .any(|w| w.eq_ignore_ascii_case(keyword))
                })
                .map(String::from)
                .collect();
            if let Some(first) = candidates.first() {
                return Ok(RootSelection {
                    name: first.clone(),
                    strategy: RootStrategy::NamingHeuristic,
                    candidates,
                });
            }
        }

        self.document
            .names()
            .next()
            .map(|name| single(name, RootStrategy::FirstDefined))
            .ok_or(SchemaError::NoDefinitions)
    }

    /// Walk the nodes reachable from `root`, visiting each definition once,
    /// and fail on the first reference to an undefined name
    fn check_references(&self, root: &'doc SchemaNode) -> Result<(), SchemaError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&'doc SchemaNode> = vec![root];

        while let Some(node) = stack.pop() {
            match &node.kind {
                NodeKind::Reference(name) => {
                    if visited.insert(name.as_str()) {
                        let target = self.document.get(name).ok_or_else(|| {
                            SchemaError::DanglingReference { name: name.clone() }
                        })?;
                        stack.push(target);
                    }
                }
                NodeKind::Object(obj) => {
                    stack.extend(obj.properties.values());
                    if let Some(additional) = &obj.additional {
                        stack.push(additional);
                    }
                }
                NodeKind::Array(arr) => stack.push(&arr.items),
                NodeKind::Union(union) => stack.extend(union.variants.iter()),
                NodeKind::Primitive(_) | NodeKind::Any => {}
            }
        }
        Ok(())
    }
}

fn single(name: &str, strategy: RootStrategy) -> RootSelection {
    RootSelection {
        name: name.to_string(),
        strategy,
        candidates: vec![name.to_string()],
    }
}
