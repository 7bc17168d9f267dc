//! Cluster retrieval seam.

use crate::error::BoxError;
use crate::object::ClusterObject;

/// Returns the current cluster representation of one object.
///
/// With `export` set, implementations return a cluster-agnostic representation
/// (no uid, resource version, status and similar live-only fields). Retries and
/// timeouts, if any, belong to the implementation.
#[async_trait::async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, kind: &str, name: &str, namespace: &str, export: bool) -> Result<ClusterObject, BoxError>;
}
