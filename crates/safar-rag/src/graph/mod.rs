//! Graph query execution seam.
//!
//! The engine speaks to the knowledge graph through `GraphQuery` so the
//! backend (HTTP endpoint, embedded store, test stub) stays swappable.
//! Implementations swallow query failures: `run` logs the error and returns
//! an empty record list, so one failing retriever never takes down the
//! pipeline.

pub mod http;

pub use http::HttpGraphClient;

use async_trait::async_trait;
use serde_json::Value;

/// One graph record: a string-keyed map of scalars or nested maps.
pub type Record = serde_json::Map<String, Value>;

#[async_trait]
pub trait GraphQuery: Send + Sync {
    /// Execute a parameterized query. Returns `[]` (never errors) on
    /// failure; implementations log the cause.
    async fn run(&self, query: &str, params: Value) -> Vec<Record>;

    /// Nearest-neighbor search over a vector index, composed with an
    /// optional Cypher tail for scoping and projection. Results come back
    /// descending by score.
    async fn vector_query(
        &self,
        index_name: &str,
        k: usize,
        embedding: &[f32],
        cypher_tail: &str,
        mut params: Value,
    ) -> Vec<Record> {
        let statement = format!(
            "CALL db.index.vector.queryNodes($index_name, $top_k, $embedding) \
             YIELD node, score {cypher_tail}"
        );
        if let Value::Object(map) = &mut params {
            map.insert("index_name".into(), Value::String(index_name.into()));
            map.insert("top_k".into(), serde_json::json!(k));
            map.insert("embedding".into(), serde_json::json!(embedding));
        }
        self.run(&statement, params).await
    }
}
