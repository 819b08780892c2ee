use crate::{
    check::ReachabilityChecker,
    condition::{CollectCondition, SearchCondition},
    config::PaginationConfig,
    error::Result,
    expand::RelationExpander,
    models::*,
    mutation::TupleWriter,
    pagination::{PageStateCache, SweeperHandle},
    repository::TupleStore,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Relation graph engine: the single entry point for delivery layers.
pub struct RelationEngine {
    /// Storage for relation tuples
    store: Arc<dyn TupleStore>,

    /// Point-to-point reachability queries
    checker: Arc<ReachabilityChecker>,

    /// Neighbourhood collection queries
    expander: RelationExpander,

    /// Cycle-safe mutations
    writer: TupleWriter,

    /// Resume state for unfiltered full scans
    pages: Arc<PageStateCache>,
    sweeper: Mutex<Option<SweeperHandle>>,
    page_size: usize,
}

impl RelationEngine {
    /// Create an engine over `store` and start the page state sweeper.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(store: Arc<dyn TupleStore>, pagination: &PaginationConfig) -> Result<Self> {
        pagination.validate()?;

        let checker = Arc::new(ReachabilityChecker::new(store.clone()));
        let expander = RelationExpander::new(store.clone());
        let writer = TupleWriter::new(store.clone(), checker.clone());

        let pages = Arc::new(PageStateCache::new(pagination.page_ttl()));
        let sweeper = pages.spawn_sweeper(pagination.sweep_interval())?;

        Ok(Self {
            store,
            checker,
            expander,
            writer,
            pages,
            sweeper: Mutex::new(Some(sweeper)),
            page_size: pagination.page_size,
        })
    }

    /// Stop background work. Queries keep working afterwards, but expired
    /// page states are no longer evicted.
    pub async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
            info!("Relation engine shut down");
        }
    }

    pub async fn healthy(&self) -> Result<()> {
        self.store.ping().await
    }

    // =============================================================================
    // Tuple Management
    // =============================================================================

    /// Read tuples matching `pattern`.
    ///
    /// An all-wildcard pattern is served as a paginated full scan: the
    /// returned token resumes after the last tuple of this page. Filtered
    /// reads return every match at once and no token.
    pub async fn get(
        &self,
        pattern: &RelationTuple,
        page_token: Option<&str>,
    ) -> Result<(Vec<RelationTuple>, Option<String>)> {
        if !pattern.is_empty() {
            return Ok((self.store.query(pattern).await?, None));
        }

        let last_id = match page_token {
            Some(token) => {
                self.pages
                    .take(token)
                    .map_err(|e| {
                        warn!("Unknown or expired page token");
                        e
                    })?
                    .last_seen_id
            }
            None => 0,
        };

        let page = self
            .store
            .get_all(PageOptions {
                last_id,
                page_size: self.page_size,
            })
            .await?;
        let token = page.last_id.map(|id| self.pages.issue(id));

        Ok((page.tuples, token))
    }

    pub async fn create(&self, tuple: &RelationTuple, exist_ok: bool) -> Result<()> {
        self.writer.create(tuple, exist_ok).await
    }

    pub async fn delete(&self, tuple: &RelationTuple) -> Result<()> {
        self.writer.delete(tuple).await
    }

    pub async fn delete_by_queries(&self, patterns: &[RelationTuple]) -> Result<()> {
        self.writer.delete_by_queries(patterns).await
    }

    pub async fn batch_operation(&self, operations: &[Operation]) -> Result<()> {
        self.writer.batch_operation(operations).await
    }

    pub async fn get_all_namespaces(&self) -> Result<Vec<String>> {
        self.store.get_all_namespaces().await
    }

    pub async fn clear_all_relations(&self) -> Result<()> {
        self.store.delete_all().await
    }

    // =============================================================================
    // Graph Queries
    // =============================================================================

    pub async fn check(
        &self,
        subject: &Vertex,
        object: &Vertex,
        search: &SearchCondition,
    ) -> Result<bool> {
        self.checker.check(subject, object, search).await
    }

    pub async fn get_shortest_path(
        &self,
        subject: &Vertex,
        object: &Vertex,
        search: &SearchCondition,
    ) -> Result<Option<Vec<RelationTuple>>> {
        self.checker.shortest_path(subject, object, search).await
    }

    pub async fn get_all_paths(
        &self,
        subject: &Vertex,
        object: &Vertex,
        search: &SearchCondition,
    ) -> Result<Vec<Vec<RelationTuple>>> {
        self.checker.all_paths(subject, object, search).await
    }

    pub async fn get_all_object_relations(
        &self,
        subject: &Vertex,
        search: &SearchCondition,
        collect: &CollectCondition,
        max_depth: usize,
    ) -> Result<Vec<RelationTuple>> {
        self.expander
            .object_relations(subject, search, collect, max_depth)
            .await
    }

    pub async fn get_all_subject_relations(
        &self,
        object: &Vertex,
        search: &SearchCondition,
        collect: &CollectCondition,
        max_depth: usize,
    ) -> Result<Vec<RelationTuple>> {
        self.expander
            .subject_relations(object, search, collect, max_depth)
            .await
    }
}
