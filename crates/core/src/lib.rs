//! Spread core: the object staging pipeline stages.
//!
//! Every stage is a plain function (or a small struct around one) returning an
//! explicit `Result`; the cluster and the project index are reached only through
//! the [`ObjectFetcher`] and [`IndexBackend`] seams so the pipeline can run
//! outside a command-line context.

#![forbid(unsafe_code)]

pub mod config;
pub mod encode;
pub mod error;
pub mod fetch;
pub mod kinds;
pub mod locator;
pub mod object;
pub mod path;
pub mod stage;

pub use config::{ObjectFormat, StageConfig};
pub use encode::{encode, encode_with, RepositoryObject};
pub use error::{BoxError, StageError};
pub use fetch::ObjectFetcher;
pub use kinds::canonicalize;
pub use locator::{parse, ResourceReference};
pub use object::{normalize, ClusterObject, NormalizedObject, BASELINE_VERSION};
pub use path::{resolve_path, RepositoryPath};
pub use stage::{BlobId, IndexBackend, IndexStager, MemIndex, StageState, StagedRef};

pub mod prelude {
    pub use super::{
        canonicalize, encode, normalize, parse, resolve_path, ClusterObject, IndexBackend, IndexStager,
        NormalizedObject, ObjectFetcher, RepositoryObject, RepositoryPath, ResourceReference, StageConfig,
        StageError, StagedRef,
    };
}
