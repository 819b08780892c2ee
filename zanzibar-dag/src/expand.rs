use crate::{
    condition::{CollectCondition, SearchCondition},
    error::Result,
    models::*,
    repository::TupleStore,
    validation::validate_vertex,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Which side of a tuple the frontier vertex is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Frontier is the subject; walk towards objects.
    Outgoing,
    /// Frontier is the object; walk towards subjects.
    Incoming,
}

impl Direction {
    fn frontier_pattern(self, vertex: &Vertex) -> RelationTuple {
        match self {
            Self::Outgoing => vertex.as_subject_pattern(),
            Self::Incoming => vertex.as_object_pattern(),
        }
    }

    fn next_vertex(self, tuple: &RelationTuple) -> Vertex {
        match self {
            Self::Outgoing => tuple.object(),
            Self::Incoming => tuple.subject(),
        }
    }
}

/// Collects the relation tuples surrounding a vertex, level by level.
pub struct RelationExpander {
    store: Arc<dyn TupleStore>,
}

impl RelationExpander {
    pub fn new(store: Arc<dyn TupleStore>) -> Self {
        Self { store }
    }

    /// Tuples reachable from `subject` within `max_depth` levels, kept when
    /// their object vertex passes `collect`.
    pub async fn object_relations(
        &self,
        subject: &Vertex,
        search: &SearchCondition,
        collect: &CollectCondition,
        max_depth: usize,
    ) -> Result<Vec<RelationTuple>> {
        validate_vertex(subject, true)?;
        self.expand(subject, Direction::Outgoing, search, collect, max_depth)
            .await
    }

    /// Tuples leading into `object` within `max_depth` levels, kept when
    /// their subject vertex passes `collect`.
    pub async fn subject_relations(
        &self,
        object: &Vertex,
        search: &SearchCondition,
        collect: &CollectCondition,
        max_depth: usize,
    ) -> Result<Vec<RelationTuple>> {
        validate_vertex(object, false)?;
        self.expand(object, Direction::Incoming, search, collect, max_depth)
            .await
    }

    /// Breadth-first walk from `start`. Collection and expansion are
    /// independent decisions on the same neighbour. The result is
    /// duplicate-free, in discovery order.
    pub async fn expand(
        &self,
        start: &Vertex,
        direction: Direction,
        search: &SearchCondition,
        collect: &CollectCondition,
        max_depth: usize,
    ) -> Result<Vec<RelationTuple>> {
        let mut collected = Vec::new();
        let mut seen = HashSet::new();
        let mut visited = HashSet::from([start.clone()]);
        let mut frontier = VecDeque::from([start.clone()]);
        let mut depth = 0;

        while depth < max_depth && !frontier.is_empty() {
            for _ in 0..frontier.len() {
                let Some(vertex) = frontier.pop_front() else {
                    break;
                };
                let tuples = self.store.query(&direction.frontier_pattern(&vertex)).await?;

                for tuple in tuples {
                    let next = direction.next_vertex(&tuple);
                    if !search.should_stop(&next) && visited.insert(next.clone()) {
                        frontier.push_back(next.clone());
                    }
                    if collect.should_collect(&next) && seen.insert(tuple.clone()) {
                        collected.push(tuple);
                    }
                }
            }
            depth += 1;
        }

        debug!(
            start = %start,
            direction = ?direction,
            depth,
            collected = collected.len(),
            "Relation expansion finished"
        );
        Ok(collected)
    }
}
