//! Spread project: a bare git repository under `.spread/` whose index holds
//! staged objects. Keep code tiny and predictable.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use git2::{IndexEntry, IndexTime, Oid, Repository};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use spread_core::{BlobId, IndexBackend, RepositoryPath};
use tracing::{debug, info, warn};

/// Directory holding the project repository, relative to the project root.
pub const PROJECT_DIR: &str = ".spread";

const FILE_MODE: u32 = 0o100644;

/// One registered index entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexedEntry {
    pub path: String,
    pub blob: BlobId,
    pub size: u32,
}

pub struct Project {
    root: PathBuf,
    repo: Repository,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project").field("root", &self.root).finish_non_exhaustive()
    }
}

impl Project {
    /// Create `.spread/` under `root`, or open it when it already exists.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dir = root.join(PROJECT_DIR);
        let repo = if dir.is_dir() {
            debug!(path = %dir.display(), "project already initialized");
            Repository::open_bare(&dir).with_context(|| format!("opening {}", dir.display()))?
        } else {
            info!(path = %dir.display(), "initializing project");
            Repository::init_bare(&dir).with_context(|| format!("initializing {}", dir.display()))?
        };
        Ok(Self { root, repo })
    }

    /// Find the nearest enclosing project, walking up from `start`.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        for dir in start.ancestors() {
            let candidate = dir.join(PROJECT_DIR);
            if candidate.is_dir() {
                let repo = Repository::open_bare(&candidate)
                    .with_context(|| format!("opening {}", candidate.display()))?;
                debug!(path = %candidate.display(), "project found");
                return Ok(Self { root: dir.to_path_buf(), repo });
            }
        }
        Err(anyhow!("no {} directory in {} or any parent", PROJECT_DIR, start.display()))
    }

    /// [`Project::discover`] from the process working directory.
    pub fn open_current() -> Result<Self> {
        let cwd = std::env::current_dir().context("reading current directory")?;
        Self::discover(cwd)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registered entries in index order.
    pub fn entries(&self) -> Result<Vec<IndexedEntry>> {
        let index = self.repo.index().context("reading index")?;
        let out = index
            .iter()
            .map(|e| IndexedEntry {
                path: String::from_utf8_lossy(&e.path).into_owned(),
                blob: BlobId(e.id.to_string()),
                size: e.file_size,
            })
            .collect();
        Ok(out)
    }

    /// Content of the blob registered at `path`, if any.
    pub fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let index = self.repo.index().context("reading index")?;
        match index.get_path(Path::new(path), 0) {
            Some(entry) => {
                let blob = self.repo.find_blob(entry.id).with_context(|| format!("loading blob {}", entry.id))?;
                Ok(Some(blob.content().to_vec()))
            }
            None => Ok(None),
        }
    }
}

impl IndexBackend for Project {
    fn check_writable(&self) -> std::result::Result<(), String> {
        let dir = self.repo.path();
        match std::fs::metadata(dir) {
            Ok(meta) if meta.permissions().readonly() => Err(format!("{} is read-only", dir.display())),
            Ok(_) => Ok(()),
            Err(e) => Err(format!("{}: {}", dir.display(), e)),
        }
    }

    fn write_blob(&mut self, content: &[u8]) -> Result<BlobId> {
        let oid = self.repo.blob(content).context("writing blob")?;
        Ok(BlobId(oid.to_string()))
    }

    fn register(&mut self, path: &RepositoryPath, blob: &BlobId, size: usize) -> Result<bool> {
        let started = Instant::now();
        let rel = path.to_string();
        let id = Oid::from_str(&blob.0).with_context(|| format!("parsing blob id {}", blob))?;
        let file_size = u32::try_from(size).map_err(|_| anyhow!("object too large for index: {} bytes", size))?;

        let mut index = self.repo.index().context("reading index")?;
        let replaced = index.get_path(Path::new(&rel), 0).is_some();
        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: FILE_MODE,
            uid: 0,
            gid: 0,
            file_size,
            id,
            flags: 0,
            flags_extended: 0,
            path: rel.clone().into_bytes(),
        };
        index.add(&entry).with_context(|| format!("adding {} to index", rel))?;
        // The on-disk index is replaced atomically; on failure drop the in-memory change too.
        if let Err(e) = index.write() {
            if let Err(re) = index.read(true) {
                warn!(error = %re, "failed to reload index after write error");
            }
            return Err(e).with_context(|| format!("writing index for {}", rel));
        }
        histogram!("index_write_ms", started.elapsed().as_secs_f64() * 1000.0);
        counter!("index_write_total", 1u64);
        Ok(replaced)
    }
}
