//! Shape checks applied before any traversal or store mutation.

use crate::{
    error::{DagError, Result},
    models::{RelationTuple, Vertex},
};

/// Character the relational store uses to join tuple fields into its key.
pub const RESERVED_DELIMITER: char = '%';

/// Object namespace/name/relation and subject namespace/name are required;
/// the subject relation may be empty.
pub fn validate_tuple(tuple: &RelationTuple) -> Result<()> {
    let required = [
        ("object_namespace", &tuple.object_namespace),
        ("object_name", &tuple.object_name),
        ("relation", &tuple.relation),
        ("subject_namespace", &tuple.subject_namespace),
        ("subject_name", &tuple.subject_name),
    ];
    for (field, value) in required {
        if value.is_empty() {
            return Err(DagError::RequestBody(format!(
                "Tuple field '{}' can't be empty",
                field
            )));
        }
    }
    check_reserved(&tuple.fields())
}

/// A subject vertex may omit its relation, an object vertex may not.
pub fn validate_vertex(vertex: &Vertex, is_subject: bool) -> Result<()> {
    if vertex.namespace.is_empty() || vertex.name.is_empty() {
        return Err(DagError::RequestBody(format!(
            "Vertex '{}' needs a namespace and a name",
            vertex
        )));
    }
    if !is_subject && vertex.relation.is_empty() {
        return Err(DagError::RequestBody(format!(
            "Object vertex '{}' needs a relation",
            vertex
        )));
    }
    check_reserved(&[
        vertex.namespace.as_str(),
        vertex.name.as_str(),
        vertex.relation.as_str(),
    ])
}

fn check_reserved(fields: &[&str]) -> Result<()> {
    match fields.iter().find(|field| field.contains(RESERVED_DELIMITER)) {
        Some(field) => Err(DagError::RequestBody(format!(
            "'{}' contains reserved character '{}'",
            field, RESERVED_DELIMITER
        ))),
        None => Ok(()),
    }
}
