use crate::{
    condition::SearchCondition,
    error::Result,
    models::*,
    repository::TupleStore,
    validation::validate_vertex,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Answers point-to-point reachability questions over the relation graph.
///
/// Every algorithm walks the subject → object adjacency breadth-first,
/// issuing one store query per expanded vertex. None of them bounds depth:
/// termination of [`ReachabilityChecker::all_paths`] in particular relies on
/// the stored graph being acyclic, which `TupleWriter::create` guarantees.
pub struct ReachabilityChecker {
    store: Arc<dyn TupleStore>,
}

struct PathItem {
    vertex: Vertex,
    path: Vec<RelationTuple>,
}

impl ReachabilityChecker {
    pub fn new(store: Arc<dyn TupleStore>) -> Self {
        Self { store }
    }

    /// Whether `object` is reachable from `subject`
    pub async fn check(
        &self,
        subject: &Vertex,
        object: &Vertex,
        search: &SearchCondition,
    ) -> Result<bool> {
        validate_vertex(object, false)?;
        validate_vertex(subject, true)?;
        self.reachable(subject, object, search).await
    }

    /// Unvalidated reachability, also used by the cycle guard where the
    /// target may be a subject vertex without a relation.
    pub(crate) async fn reachable(
        &self,
        from: &Vertex,
        to: &Vertex,
        search: &SearchCondition,
    ) -> Result<bool> {
        let mut visited = HashSet::from([from.clone()]);
        let mut queue = VecDeque::from([from.clone()]);
        let mut queries = 0usize;

        while let Some(vertex) = queue.pop_front() {
            let tuples = self.store.query(&vertex.as_subject_pattern()).await?;
            queries += 1;

            for tuple in tuples {
                let child = tuple.object();
                if child == *to {
                    debug!(from = %from, to = %to, queries, "Reachability check succeeded");
                    return Ok(true);
                }
                if !search.should_stop(&child) && visited.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }

        debug!(from = %from, to = %to, queries, "Reachability check exhausted frontier");
        Ok(false)
    }

    /// A fewest-edges path from `subject` to `object`, in subject-to-object order.
    ///
    /// Among equally short paths the store's enumeration order decides.
    pub async fn shortest_path(
        &self,
        subject: &Vertex,
        object: &Vertex,
        search: &SearchCondition,
    ) -> Result<Option<Vec<RelationTuple>>> {
        validate_vertex(object, false)?;
        validate_vertex(subject, true)?;

        let mut visited = HashSet::from([subject.clone()]);
        let mut queue = VecDeque::from([PathItem {
            vertex: subject.clone(),
            path: Vec::new(),
        }]);

        while let Some(item) = queue.pop_front() {
            let tuples = self.store.query(&item.vertex.as_subject_pattern()).await?;

            for tuple in tuples {
                let child = tuple.object();
                let mut path = item.path.clone();
                path.push(tuple);

                if child == *object {
                    debug!(subject = %subject, object = %object, length = path.len(), "Shortest path found");
                    return Ok(Some(path));
                }
                if !search.should_stop(&child) && visited.insert(child.clone()) {
                    queue.push_back(PathItem { vertex: child, path });
                }
            }
        }

        Ok(None)
    }

    /// Every path from `subject` to `object`.
    ///
    /// No visited set is kept: reaching a vertex along two different paths
    /// yields two distinct justifications.
    pub async fn all_paths(
        &self,
        subject: &Vertex,
        object: &Vertex,
        search: &SearchCondition,
    ) -> Result<Vec<Vec<RelationTuple>>> {
        validate_vertex(object, false)?;
        validate_vertex(subject, true)?;

        let mut paths = Vec::new();
        let mut queue = VecDeque::from([PathItem {
            vertex: subject.clone(),
            path: Vec::new(),
        }]);

        while let Some(item) = queue.pop_front() {
            let tuples = self.store.query(&item.vertex.as_subject_pattern()).await?;

            for tuple in tuples {
                let child = tuple.object();
                let mut path = item.path.clone();
                path.push(tuple);

                if child == *object {
                    paths.push(path.clone());
                }
                if !search.should_stop(&child) {
                    queue.push_back(PathItem { vertex: child, path });
                }
            }
        }

        debug!(subject = %subject, object = %object, found = paths.len(), "All paths enumerated");
        Ok(paths)
    }
}
