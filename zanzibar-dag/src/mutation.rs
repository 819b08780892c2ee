use crate::{
    check::ReachabilityChecker,
    condition::SearchCondition,
    error::{DagError, Result},
    models::*,
    repository::TupleStore,
    validation::validate_tuple,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Write path that keeps the stored relation graph acyclic.
pub struct TupleWriter {
    store: Arc<dyn TupleStore>,
    checker: Arc<ReachabilityChecker>,
}

impl TupleWriter {
    pub fn new(store: Arc<dyn TupleStore>, checker: Arc<ReachabilityChecker>) -> Self {
        Self { store, checker }
    }

    /// Store `tuple` unless it would close a cycle.
    ///
    /// Adding subject → object closes a cycle exactly when the object vertex
    /// already reaches the subject vertex.
    pub async fn create(&self, tuple: &RelationTuple, exist_ok: bool) -> Result<()> {
        validate_tuple(tuple)?;

        let object = tuple.object();
        let subject = tuple.subject();
        if object == subject
            || self
                .checker
                .reachable(&object, &subject, &SearchCondition::default())
                .await?
        {
            warn!(tuple = %tuple, "Rejected tuple that would create a cycle");
            return Err(DagError::GraphCycle(tuple.to_string()));
        }

        match self.store.create(tuple).await {
            Ok(()) => {
                info!("Tuple created: {}", tuple);
                Ok(())
            }
            Err(DagError::DuplicateKey(_)) if exist_ok => {
                debug!("Tuple already exists: {}", tuple);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, tuple: &RelationTuple) -> Result<()> {
        validate_tuple(tuple)?;
        self.store.delete(tuple).await?;
        info!("Tuple deleted: {}", tuple);
        Ok(())
    }

    pub async fn delete_by_queries(&self, patterns: &[RelationTuple]) -> Result<()> {
        self.store.delete_by_queries(patterns).await?;
        info!("Deleted tuples matching {} patterns", patterns.len());
        Ok(())
    }

    /// Apply `operations` atomically.
    ///
    /// Every operation is shape-checked before the store is touched. The
    /// cycle guard is not run per operation, so a batch can insert a cycle.
    pub async fn batch_operation(&self, operations: &[Operation]) -> Result<()> {
        for operation in operations {
            validate_tuple(operation.tuple())?;
        }
        if operations.is_empty() {
            return Ok(());
        }

        self.store.batch_operation(operations).await?;
        info!("Batch of {} operations applied", operations.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryTupleStore;

    fn writer() -> (Arc<InMemoryTupleStore>, TupleWriter) {
        let store = Arc::new(InMemoryTupleStore::new());
        let checker = Arc::new(ReachabilityChecker::new(store.clone()));
        (store.clone(), TupleWriter::new(store, checker))
    }

    fn tuple(notation: &str) -> RelationTuple {
        notation.parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_rejects_two_cycle() {
        let (store, writer) = writer();
        writer.create(&tuple("doc:1#viewer@group:eng#member"), false).await.unwrap();

        let err = writer
            .create(&tuple("group:eng#member@doc:1#viewer"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, DagError::GraphCycle(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_self_loop() {
        let (store, writer) = writer();
        let err = writer
            .create(&tuple("group:eng#member@group:eng#member"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, DagError::GraphCycle(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_exist_ok() {
        let (store, writer) = writer();
        let viewer = tuple("doc:1#viewer@user:alice");

        writer.create(&viewer, true).await.unwrap();
        writer.create(&viewer, true).await.unwrap();
        assert_eq!(store.len(), 1);

        let err = writer.create(&viewer, false).await.unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn test_validation_happens_before_store() {
        let (store, writer) = writer();
        let mut bad = tuple("doc:1#viewer@user:alice");
        bad.object_name.clear();

        assert!(matches!(writer.create(&bad, false).await, Err(DagError::RequestBody(_))));
        assert!(matches!(writer.delete(&bad).await, Err(DagError::RequestBody(_))));

        let result = writer
            .batch_operation(&[
                Operation::Create(tuple("doc:2#viewer@user:bob")),
                Operation::Create(bad),
            ])
            .await;
        assert!(matches!(result, Err(DagError::RequestBody(_))));
        assert!(store.is_empty());
    }
}
