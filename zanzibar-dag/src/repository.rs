use crate::{
    config::{StoreBackend, StoreConfig},
    error::{DagError, Result},
    models::*,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, info};

pub mod postgres;

pub use postgres::PostgresTupleStore;

/// Storage contract consumed by the graph engine.
///
/// In every `pattern` argument an empty field is a wildcard and a non-empty
/// field must match exactly.
#[async_trait]
pub trait TupleStore: Send + Sync {
    /// Verify the backing store is reachable
    async fn ping(&self) -> Result<()>;

    /// Read every tuple matching the pattern
    async fn query(&self, pattern: &RelationTuple) -> Result<Vec<RelationTuple>>;

    /// Insert a tuple, failing with `DuplicateKey` if it is already stored
    async fn create(&self, tuple: &RelationTuple) -> Result<()>;

    /// Remove a tuple; removing an absent tuple is not an error
    async fn delete(&self, tuple: &RelationTuple) -> Result<()>;

    /// Expand each pattern and delete the union of the matches in one batch
    async fn delete_by_queries(&self, patterns: &[RelationTuple]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut operations = Vec::new();
        for pattern in patterns {
            for tuple in self.query(pattern).await? {
                if seen.insert(tuple.clone()) {
                    operations.push(Operation::Delete(tuple));
                }
            }
        }
        if operations.is_empty() {
            return Ok(());
        }
        self.batch_operation(&operations).await
    }

    /// Apply all operations or none of them
    async fn batch_operation(&self, operations: &[Operation]) -> Result<()>;

    /// Distinct namespaces appearing on either side of any tuple
    async fn get_all_namespaces(&self) -> Result<Vec<String>>;

    /// Full scan ordered by tuple identity
    async fn get_all(&self, page: PageOptions) -> Result<TuplePage>;

    async fn delete_all(&self) -> Result<()>;
}

/// Build the store selected by configuration.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn TupleStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory tuple store");
            Ok(Arc::new(InMemoryTupleStore::new()))
        }
        StoreBackend::Postgres => {
            let connection_string = config.connection_string.as_deref().ok_or_else(|| {
                DagError::ConfigError("store.connection_string is required for postgres".into())
            })?;
            let store =
                PostgresTupleStore::connect(connection_string, config.max_connections).await?;
            store.ensure_schema().await?;
            info!("Using PostgreSQL tuple store");
            Ok(Arc::new(store))
        }
        StoreBackend::Redis | StoreBackend::Mongo => Err(DagError::NotImplemented(format!(
            "{:?} tuple store",
            config.backend
        ))),
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    rows: BTreeMap<i64, RelationTuple>,
    ids: HashMap<RelationTuple, i64>,
}

impl MemoryState {
    fn insert(&mut self, tuple: &RelationTuple) -> Result<()> {
        if self.ids.contains_key(tuple) {
            return Err(DagError::DuplicateKey(tuple.to_string()));
        }
        self.next_id += 1;
        self.rows.insert(self.next_id, tuple.clone());
        self.ids.insert(tuple.clone(), self.next_id);
        Ok(())
    }

    fn remove(&mut self, tuple: &RelationTuple) {
        if let Some(id) = self.ids.remove(tuple) {
            self.rows.remove(&id);
        }
    }

    fn apply(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::Create(tuple) => self.insert(tuple),
            Operation::CreateIfNotExists(tuple) => match self.insert(tuple) {
                Err(DagError::DuplicateKey(_)) => Ok(()),
                other => other,
            },
            Operation::Delete(tuple) => {
                self.remove(tuple);
                Ok(())
            }
        }
    }
}

/// In-memory tuple store for testing and development
///
/// Rows are kept in insertion order under a monotonically increasing id,
/// which doubles as the full-scan cursor.
#[derive(Default)]
pub struct InMemoryTupleStore {
    state: RwLock<MemoryState>,
}

impl InMemoryTupleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TupleStore for InMemoryTupleStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn query(&self, pattern: &RelationTuple) -> Result<Vec<RelationTuple>> {
        let state = self.state.read();
        Ok(state
            .rows
            .values()
            .filter(|tuple| tuple.matches(pattern))
            .cloned()
            .collect())
    }

    async fn create(&self, tuple: &RelationTuple) -> Result<()> {
        self.state.write().insert(tuple)
    }

    async fn delete(&self, tuple: &RelationTuple) -> Result<()> {
        self.state.write().remove(tuple);
        Ok(())
    }

    async fn batch_operation(&self, operations: &[Operation]) -> Result<()> {
        let mut state = self.state.write();
        let mut staged = state.clone();
        for operation in operations {
            staged.apply(operation)?;
        }
        *state = staged;
        debug!("Batch of {} operations applied", operations.len());
        Ok(())
    }

    async fn get_all_namespaces(&self) -> Result<Vec<String>> {
        let state = self.state.read();
        let namespaces: BTreeSet<String> = state
            .rows
            .values()
            .flat_map(|tuple| [tuple.object_namespace.clone(), tuple.subject_namespace.clone()])
            .collect();
        Ok(namespaces.into_iter().collect())
    }

    async fn get_all(&self, page: PageOptions) -> Result<TuplePage> {
        let state = self.state.read();
        let rows: Vec<(i64, RelationTuple)> = state
            .rows
            .range((Bound::Excluded(page.last_id), Bound::Unbounded))
            .take(page.page_size)
            .map(|(id, tuple)| (*id, tuple.clone()))
            .collect();

        let last_id = rows.last().map(|(id, _)| *id);
        Ok(TuplePage {
            tuples: rows.into_iter().map(|(_, tuple)| tuple).collect(),
            last_id,
        })
    }

    async fn delete_all(&self) -> Result<()> {
        let mut state = self.state.write();
        state.rows.clear();
        state.ids.clear();
        Ok(())
    }
}
