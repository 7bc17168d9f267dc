//! Spread staging pipeline façade.
//!
//! Frontends (the CLI today, possibly a service later) call [`Stager::add`] with
//! any [`ObjectFetcher`] and [`IndexBackend`]; [`add_from_cluster`] wires the
//! kube fetcher and the on-disk project for the in-process case.

#![forbid(unsafe_code)]

use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use spread_core::{
    encode_with, normalize, parse, resolve_path, IndexBackend, IndexStager, ObjectFetcher, ResourceReference,
    StageConfig, StageError,
};
use spread_kubehub::KubeFetcher;
use spread_project::Project;

pub use spread_core::StagedRef;

/// Default namespace objects are looked up in.
pub const DEFAULT_NAMESPACE: &str = "default";

/// A pipeline failure with the context needed to diagnose it.
#[derive(Debug, thiserror::Error)]
#[error("cannot add '{reference}' (namespace={namespace})")]
pub struct AddError {
    pub reference: String,
    pub namespace: String,
    #[source]
    pub source: StageError,
}

impl AddError {
    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }
}

/// A parsed `add` invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddRequest {
    /// Reference as typed by the user.
    pub reference: ResourceReference,
    /// Same reference with its kind alias expanded.
    pub canonical: ResourceReference,
    pub namespace: String,
    pub export: bool,
}

impl AddRequest {
    /// Parse `reference` (`<kind>/<name>`) and expand its kind alias.
    pub fn new(reference: &str, namespace: &str, export: bool) -> Result<Self, AddError> {
        let parsed = parse(reference).map_err(|source| AddError {
            reference: reference.to_string(),
            namespace: namespace.to_string(),
            source,
        })?;
        let canonical = parsed.canonical();
        Ok(Self { reference: parsed, canonical, namespace: namespace.to_string(), export })
    }

    fn error(&self, source: StageError) -> AddError {
        AddError { reference: self.reference.to_string(), namespace: self.namespace.clone(), source }
    }
}

/// Runs fetch → normalize → resolve path → encode → stage, once each, failing fast.
#[derive(Debug, Clone, Default)]
pub struct Stager {
    cfg: StageConfig,
}

impl Stager {
    pub fn new(cfg: StageConfig) -> Self {
        Self { cfg }
    }

    pub fn from_env() -> Self {
        Self::new(StageConfig::from_env())
    }

    pub fn config(&self) -> &StageConfig {
        &self.cfg
    }

    pub async fn add<F, I>(&self, fetcher: &F, project: Option<&mut I>, req: &AddRequest) -> Result<StagedRef, AddError>
    where
        F: ObjectFetcher + ?Sized,
        I: IndexBackend + ?Sized,
    {
        self.add_in(fetcher, project.ok_or_else(|| "no project is open".to_string()), req).await
    }

    /// [`Stager::add`] where the project may have failed to open; the reason
    /// ends up in the `NoProject` error.
    pub async fn add_in<F, I>(
        &self,
        fetcher: &F,
        project: Result<&mut I, String>,
        req: &AddRequest,
    ) -> Result<StagedRef, AddError>
    where
        F: ObjectFetcher + ?Sized,
        I: IndexBackend + ?Sized,
    {
        let started = Instant::now();
        counter!("add_attempts", 1u64);
        let res = self.run(fetcher, project, req).await;
        histogram!("add_latency_ms", started.elapsed().as_secs_f64() * 1000.0);
        match &res {
            Ok(staged) => info!(reference = %req.reference, path = %staged.path, took_ms = %started.elapsed().as_millis(), "add ok"),
            Err(e) => {
                counter!("add_err", 1u64);
                error!(reference = %req.reference, namespace = %req.namespace, kind = e.kind(), error = %e.source, "add failed");
            }
        }
        res
    }

    async fn run<F, I>(&self, fetcher: &F, project: Result<&mut I, String>, req: &AddRequest) -> Result<StagedRef, AddError>
    where
        F: ObjectFetcher + ?Sized,
        I: IndexBackend + ?Sized,
    {
        let ResourceReference { kind, name } = &req.canonical;
        debug!(kind = %kind, name = %name, namespace = %req.namespace, export = req.export, "fetching");
        let live = fetcher
            .fetch(kind, name, &req.namespace, req.export)
            .await
            .map_err(|source| {
                req.error(StageError::Retrieval {
                    kind: kind.clone(),
                    name: name.clone(),
                    namespace: req.namespace.clone(),
                    source,
                })
            })?;

        let normalized = normalize(&live, &req.namespace).map_err(|e| req.error(e))?;
        if normalized.name() != name.as_str() {
            warn!(requested = %name, returned = %normalized.name(), "cluster returned a differently named object");
        }
        let path = resolve_path(&normalized).map_err(|e| req.error(e))?;
        debug!(path = %path, api_version = normalized.api_version(), "resolved");
        let entity = encode_with(&self.cfg, normalized.name(), &path, &normalized).map_err(|e| req.error(e))?;

        IndexStager::new().stage_in(project, &entity).map_err(|e| req.error(e))
    }
}

/// Connect to the cluster behind `context`, open the project enclosing the
/// working directory, and stage `req` into it.
pub async fn add_from_cluster(context: Option<&str>, req: &AddRequest) -> Result<StagedRef, AddError> {
    let fetcher = KubeFetcher::connect(context).await.map_err(|e| req.error(e))?;
    let mut project = Project::open_current().map_err(|e| format!("{e:#}"));
    if let Err(reason) = &project {
        debug!(reason = %reason, "no project");
    }
    Stager::from_env().add_in(&fetcher, project.as_mut().map_err(|e| e.clone()), req).await
}
