//! Error taxonomy shared by every pipeline stage.

/// Underlying cause reported by a collaborator (kube, git, IO).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One variant per way a staging operation can fail. Every variant is terminal
/// for the invocation that produced it.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("malformed resource reference {reference:?}: {reason}")]
    MalformedReference { reference: String, reason: &'static str },

    #[error("failed to connect to cluster (context={})", .context.as_deref().unwrap_or("current"))]
    Connection {
        context: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error("failed to retrieve {kind}/{name} (namespace={namespace}) from the cluster")]
    Retrieval {
        kind: String,
        name: String,
        namespace: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot normalize object: missing {field}")]
    Normalization { field: &'static str },

    #[error("cannot derive repository path: {component} {value:?} {reason}")]
    PathResolution { component: &'static str, value: String, reason: &'static str },

    #[error("failed to encode object {name:?}: {reason}")]
    Encoding { name: String, reason: String },

    #[error("not in a spread project: {reason}")]
    NoProject { reason: String },

    #[error("failed to stage {path} into the index")]
    Staging {
        path: String,
        #[source]
        source: BoxError,
    },
}

impl StageError {
    /// Short stable name of the taxonomy kind, used as a log/metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedReference { .. } => "malformed_reference",
            Self::Connection { .. } => "connection",
            Self::Retrieval { .. } => "retrieval",
            Self::Normalization { .. } => "normalization",
            Self::PathResolution { .. } => "path_resolution",
            Self::Encoding { .. } => "encoding",
            Self::NoProject { .. } => "no_project",
            Self::Staging { .. } => "staging",
        }
    }
}
