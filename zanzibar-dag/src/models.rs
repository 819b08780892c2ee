use crate::error::DagError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One endpoint of a relation tuple.
///
/// An empty `relation` denotes the entity itself rather than one of its
/// relation sets (e.g. `user:alice` vs. `group:eng#member`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub relation: String,
}

impl Vertex {
    pub fn new(namespace: &str, name: &str, relation: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            relation: relation.to_string(),
        }
    }

    /// The entity itself, without a relation.
    pub fn entity(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name, "")
    }

    /// Pattern matching every tuple whose subject is this vertex.
    pub fn as_subject_pattern(&self) -> RelationTuple {
        RelationTuple {
            subject_namespace: self.namespace.clone(),
            subject_name: self.name.clone(),
            subject_relation: self.relation.clone(),
            ..RelationTuple::default()
        }
    }

    /// Pattern matching every tuple whose object is this vertex.
    pub fn as_object_pattern(&self) -> RelationTuple {
        RelationTuple {
            object_namespace: self.namespace.clone(),
            object_name: self.name.clone(),
            relation: self.relation.clone(),
            ..RelationTuple::default()
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)?;
        if !self.relation.is_empty() {
            write!(f, "#{}", self.relation)?;
        }
        Ok(())
    }
}

impl FromStr for Vertex {
    type Err = DagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = s
            .split_once(':')
            .ok_or_else(|| DagError::RequestBody(format!("Vertex '{}' is missing ':'", s)))?;
        let (name, relation) = rest.split_once('#').unwrap_or((rest, ""));
        Ok(Self::new(namespace, name, relation))
    }
}

/// A directed edge from the subject vertex to the object vertex.
///
/// Used both as a stored tuple and as a query pattern, in which case every
/// empty field is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationTuple {
    #[serde(default)]
    pub object_namespace: String,
    #[serde(default)]
    pub object_name: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub subject_namespace: String,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub subject_relation: String,
}

impl RelationTuple {
    pub fn new(object: &Vertex, subject: &Vertex) -> Self {
        Self {
            object_namespace: object.namespace.clone(),
            object_name: object.name.clone(),
            relation: object.relation.clone(),
            subject_namespace: subject.namespace.clone(),
            subject_name: subject.name.clone(),
            subject_relation: subject.relation.clone(),
        }
    }

    pub fn object(&self) -> Vertex {
        Vertex::new(&self.object_namespace, &self.object_name, &self.relation)
    }

    pub fn subject(&self) -> Vertex {
        Vertex::new(
            &self.subject_namespace,
            &self.subject_name,
            &self.subject_relation,
        )
    }

    /// True when every field is a wildcard.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|field| field.is_empty())
    }

    /// Whether this tuple satisfies `pattern`. Empty pattern fields match anything.
    pub fn matches(&self, pattern: &RelationTuple) -> bool {
        self.fields()
            .iter()
            .zip(pattern.fields().iter())
            .all(|(value, wanted)| wanted.is_empty() || value == wanted)
    }

    pub fn fields(&self) -> [&str; 6] {
        [
            self.object_namespace.as_str(),
            self.object_name.as_str(),
            self.relation.as_str(),
            self.subject_namespace.as_str(),
            self.subject_name.as_str(),
            self.subject_relation.as_str(),
        ]
    }
}

impl fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.object(), self.subject())
    }
}

impl FromStr for RelationTuple {
    type Err = DagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object, subject) = s
            .split_once('@')
            .ok_or_else(|| DagError::RequestBody(format!("Tuple '{}' is missing '@'", s)))?;
        Ok(Self::new(&object.parse()?, &subject.parse()?))
    }
}

/// A single step of a batch mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "relation", rename_all = "snake_case")]
pub enum Operation {
    Create(RelationTuple),
    Delete(RelationTuple),
    /// Like `Create`, but an already stored tuple is not an error.
    CreateIfNotExists(RelationTuple),
}

impl Operation {
    pub fn tuple(&self) -> &RelationTuple {
        match self {
            Self::Create(tuple) | Self::Delete(tuple) | Self::CreateIfNotExists(tuple) => tuple,
        }
    }
}

/// Cursor for a full scan, ordered by the store's monotonic tuple identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// Only tuples with an identity strictly greater than this are returned.
    pub last_id: i64,
    pub page_size: usize,
}

/// One page of a full scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuplePage {
    pub tuples: Vec<RelationTuple>,
    /// Identity of the last tuple in the page, `None` for an empty page.
    pub last_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_notation() {
        let tuple: RelationTuple = "doc:1#viewer@group:eng#member".parse().unwrap();
        assert_eq!(tuple.object(), Vertex::new("doc", "1", "viewer"));
        assert_eq!(tuple.subject(), Vertex::new("group", "eng", "member"));
        assert_eq!(tuple.to_string(), "doc:1#viewer@group:eng#member");

        let direct: RelationTuple = "group:eng#member@user:alice".parse().unwrap();
        assert_eq!(direct.subject_relation, "");
        assert_eq!(direct.to_string(), "group:eng#member@user:alice");

        assert!("doc:1#viewer".parse::<RelationTuple>().is_err());
        assert!("doc#viewer@user:alice".parse::<RelationTuple>().is_err());
    }

    #[test]
    fn test_pattern_matching() {
        let tuple: RelationTuple = "doc:1#viewer@group:eng#member".parse().unwrap();

        assert!(tuple.matches(&RelationTuple::default()));
        assert!(tuple.matches(&Vertex::new("group", "eng", "member").as_subject_pattern()));
        assert!(tuple.matches(&Vertex::entity("group", "eng").as_subject_pattern()));
        assert!(!tuple.matches(&Vertex::new("group", "ops", "member").as_subject_pattern()));
        assert!(tuple.matches(&Vertex::new("doc", "1", "viewer").as_object_pattern()));
        assert!(RelationTuple::default().is_empty());
        assert!(!tuple.is_empty());
    }

    #[test]
    fn test_operation_wire_format() {
        let op = Operation::CreateIfNotExists("doc:1#viewer@user:alice".parse().unwrap());
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["action"], "create_if_not_exists");
        assert_eq!(json["relation"]["object_namespace"], "doc");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
