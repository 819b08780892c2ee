//! Zanzibar-style relation tuple store with acyclic graph traversal
//!
//! This crate persists directed relation tuples between typed entities and
//! answers reachability questions over the resulting graph:
//! - Existence checks ("can this subject reach that object")
//! - Shortest and exhaustive justification paths
//! - Bounded neighbourhood collection in both directions
//! - Cycle-rejecting writes and atomic batch mutation
//! - Resumable full scans with expiring page tokens
//!
//! # Core Concepts
//!
//! - **Vertex**: `(namespace, name, relation)`; an empty relation means the entity itself
//! - **Tuple**: an edge from a subject vertex to an object vertex,
//!   written `doc:1#viewer@group:eng#member`
//! - **Search condition**: allow-list restricting which vertices traversal expands through
//! - **Collect condition**: filter deciding which discovered tuples are returned
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zanzibar_dag::{
//!     config::PaginationConfig, repository::InMemoryTupleStore, RelationEngine,
//!     SearchCondition, Vertex,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryTupleStore::new());
//!     let engine = RelationEngine::new(store, &PaginationConfig::default())?;
//!
//!     engine.create(&"doc:1#viewer@group:eng#member".parse()?, false).await?;
//!     engine.create(&"group:eng#member@user:alice".parse()?, false).await?;
//!
//!     let allowed = engine
//!         .check(
//!             &Vertex::entity("user", "alice"),
//!             &Vertex::new("doc", "1", "viewer"),
//!             &SearchCondition::default(),
//!         )
//!         .await?;
//!     assert!(allowed);
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod models;
pub mod condition;
pub mod validation;
pub mod repository;
pub mod check;
pub mod expand;
pub mod mutation;
pub mod pagination;
pub mod engine;
pub mod config;
pub mod error;

pub use models::*;
pub use condition::*;
pub use engine::*;
pub use error::*;
