//! Vertex predicates steering graph traversal.
//!
//! Both conditions wrap the same [`Compare`] allow-list. An empty list means
//! "no restriction"; otherwise a vertex matches when its namespace, its name
//! or its relation appears in the corresponding set.

use crate::models::Vertex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compare {
    #[serde(default)]
    pub namespaces: HashSet<String>,
    #[serde(default)]
    pub names: HashSet<String>,
    #[serde(default)]
    pub relations: HashSet<String>,
}

impl Compare {
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty() && self.names.is_empty() && self.relations.is_empty()
    }

    pub fn matches(&self, vertex: &Vertex) -> bool {
        self.namespaces.contains(&vertex.namespace)
            || self.names.contains(&vertex.name)
            || self.relations.contains(&vertex.relation)
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespaces.insert(namespace.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.names.insert(name.to_string());
        self
    }

    pub fn with_relation(mut self, relation: &str) -> Self {
        self.relations.insert(relation.to_string());
        self
    }
}

/// Prunes traversal to vertices satisfying the allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCondition {
    #[serde(default, rename = "in")]
    pub allow: Compare,
}

impl SearchCondition {
    pub fn new(allow: Compare) -> Self {
        Self { allow }
    }

    /// Whether traversal must not expand through `vertex`.
    pub fn should_stop(&self, vertex: &Vertex) -> bool {
        if self.allow.is_empty() {
            return false;
        }
        !self.allow.matches(vertex)
    }
}

/// Filters which discovered tuples end up in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectCondition {
    #[serde(default, rename = "in")]
    pub allow: Compare,
}

impl CollectCondition {
    pub fn new(allow: Compare) -> Self {
        Self { allow }
    }

    pub fn should_collect(&self, vertex: &Vertex) -> bool {
        if self.allow.is_empty() {
            return true;
        }
        self.allow.matches(vertex)
    }
}
