//! Index staging: write the content, then register it at its path.

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{anyhow, Result};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::encode::RepositoryObject;
use crate::error::StageError;
use crate::path::RepositoryPath;

/// Content address of a written object, hex encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BlobId(pub String);

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a successful staging call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagedRef {
    pub path: String,
    pub blob: BlobId,
    /// An entry already existed at `path` and was overwritten.
    pub replaced: bool,
}

/// Backing store of a project's index.
///
/// `register` must be all-or-nothing: after an error no new mapping may be
/// visible. A blob written by `write_blob` but never registered is not part of
/// the index.
pub trait IndexBackend {
    /// `Ok` when the index is open and writable, otherwise the reason it is not.
    fn check_writable(&self) -> std::result::Result<(), String>;

    fn write_blob(&mut self, content: &[u8]) -> Result<BlobId>;

    /// Map `path` to `blob`, replacing any existing entry. Returns whether one was replaced.
    fn register(&mut self, path: &RepositoryPath, blob: &BlobId, size: usize) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StageState {
    Unstaged,
    Validating,
    Written,
    Registered,
    Failed,
}

/// Drives one staging call through `Unstaged → Validating → Written → Registered`,
/// or into `Failed`.
#[derive(Debug)]
pub struct IndexStager {
    state: StageState,
    failed_at: Option<StageState>,
}

impl Default for IndexStager {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStager {
    pub fn new() -> Self {
        Self { state: StageState::Unstaged, failed_at: None }
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    /// State the stager was in when it failed.
    pub fn failed_at(&self) -> Option<StageState> {
        self.failed_at
    }

    fn advance(&mut self, next: StageState) {
        debug!(from = ?self.state, to = ?next, "stage transition");
        self.state = next;
    }

    fn fail(&mut self, err: StageError) -> StageError {
        self.failed_at = Some(self.state);
        self.advance(StageState::Failed);
        counter!("stage_err", 1u64);
        err
    }

    /// Stage `entity` into `project`'s index. `None` means no project is open.
    pub fn stage<I: IndexBackend + ?Sized>(
        &mut self,
        project: Option<&mut I>,
        entity: &RepositoryObject,
    ) -> std::result::Result<StagedRef, StageError> {
        self.stage_in(project.ok_or_else(|| "no project is open".to_string()), entity)
    }

    /// Like [`IndexStager::stage`], with the reason the project could not be
    /// opened carried into the `NoProject` error.
    pub fn stage_in<I: IndexBackend + ?Sized>(
        &mut self,
        project: std::result::Result<&mut I, String>,
        entity: &RepositoryObject,
    ) -> std::result::Result<StagedRef, StageError> {
        let started = Instant::now();
        let path = entity.path().to_string();
        counter!("stage_attempts", 1u64);

        if self.state != StageState::Unstaged {
            return Err(self.fail(StageError::Staging {
                path,
                source: anyhow!("stager already used (state {:?})", self.state).into(),
            }));
        }

        self.advance(StageState::Validating);
        let index = match project {
            Ok(index) => index,
            Err(reason) => return Err(self.fail(StageError::NoProject { reason })),
        };
        if let Err(reason) = index.check_writable() {
            return Err(self.fail(StageError::NoProject { reason }));
        }

        let blob = match index.write_blob(entity.content()) {
            Ok(blob) => blob,
            Err(e) => return Err(self.fail(StageError::Staging { path, source: e.into() })),
        };
        self.advance(StageState::Written);

        let replaced = match index.register(entity.path(), &blob, entity.content().len()) {
            Ok(replaced) => replaced,
            Err(e) => return Err(self.fail(StageError::Staging { path, source: e.into() })),
        };
        self.advance(StageState::Registered);

        if replaced {
            counter!("stage_overwrite_total", 1u64);
            warn!(path = %path, blob = %blob, "overwrote existing index entry");
        }
        counter!("stage_ok", 1u64);
        histogram!("stage_latency_ms", started.elapsed().as_secs_f64() * 1000.0);
        info!(path = %path, blob = %blob, replaced, "object staged");
        Ok(StagedRef { path, blob, replaced })
    }
}

/// Stage with a fresh [`IndexStager`].
pub fn stage<I: IndexBackend + ?Sized>(
    project: Option<&mut I>,
    entity: &RepositoryObject,
) -> std::result::Result<StagedRef, StageError> {
    IndexStager::new().stage(project, entity)
}

/// 64-bit FNV-1a, hex encoded.
fn fnv1a_hex(bytes: &[u8]) -> String {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    format!("{h:016x}")
}

/// In-memory index for embedding and tests.
#[derive(Debug, Clone)]
pub struct MemIndex {
    blobs: BTreeMap<BlobId, Vec<u8>>,
    entries: BTreeMap<String, BlobId>,
    writable: bool,
}

impl Default for MemIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemIndex {
    pub fn new() -> Self {
        Self { blobs: BTreeMap::new(), entries: BTreeMap::new(), writable: true }
    }

    pub fn read_only() -> Self {
        Self { writable: false, ..Self::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered `(path, blob)` pairs in path order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &BlobId)> {
        self.entries.iter().map(|(p, b)| (p.as_str(), b))
    }

    /// Content registered at `path`.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).and_then(|b| self.blobs.get(b)).map(Vec::as_slice)
    }
}

impl IndexBackend for MemIndex {
    fn check_writable(&self) -> std::result::Result<(), String> {
        if self.writable { Ok(()) } else { Err("index is read-only".into()) }
    }

    fn write_blob(&mut self, content: &[u8]) -> Result<BlobId> {
        let id = BlobId(fnv1a_hex(content));
        match self.blobs.get(&id) {
            Some(stored) if stored.as_slice() != content => {
                return Err(anyhow!("blob id {} collides with different content", id));
            }
            Some(_) => {}
            None => {
                self.blobs.insert(id.clone(), content.to_vec());
            }
        }
        Ok(id)
    }

    fn register(&mut self, path: &RepositoryPath, blob: &BlobId, _size: usize) -> Result<bool> {
        if !self.blobs.contains_key(blob) {
            return Err(anyhow!("blob {} was never written", blob));
        }
        Ok(self.entries.insert(path.to_string(), blob.clone()).is_some())
    }
}
