//! Storable form of a normalized object.

use serde_json::Value as Json;

use crate::config::{ObjectFormat, StageConfig};
use crate::error::StageError;
use crate::object::NormalizedObject;
use crate::path::RepositoryPath;

/// The unit written into the index. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryObject {
    name: String,
    path: RepositoryPath,
    format: ObjectFormat,
    content: Vec<u8>,
}

impl RepositoryObject {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &RepositoryPath {
        &self.path
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// True when `v` has more than `max` nodes. Stops counting at `max + 1`.
fn node_budget_exceeded(v: &Json, max: usize) -> bool {
    fn walk(v: &Json, cur: &mut usize, limit: usize) {
        if *cur >= limit {
            return;
        }
        *cur += 1;
        match v {
            Json::Object(map) => {
                for vv in map.values() {
                    if *cur >= limit { break; }
                    walk(vv, cur, limit);
                }
            }
            Json::Array(arr) => {
                for vv in arr {
                    if *cur >= limit { break; }
                    walk(vv, cur, limit);
                }
            }
            _ => {}
        }
    }
    let mut count = 0usize;
    walk(v, &mut count, max.saturating_add(1));
    count > max
}

/// [`encode_with`] using the default configuration.
pub fn encode(name: &str, path: &RepositoryPath, obj: &NormalizedObject) -> Result<RepositoryObject, StageError> {
    encode_with(&StageConfig::default(), name, path, obj)
}

/// Serialize `obj` into its content form. Object keys come out sorted, so equal
/// objects always encode to identical bytes.
pub fn encode_with(
    cfg: &StageConfig,
    name: &str,
    path: &RepositoryPath,
    obj: &NormalizedObject,
) -> Result<RepositoryObject, StageError> {
    let fail = |reason: String| StageError::Encoding { name: name.to_string(), reason };
    if name.is_empty() {
        return Err(fail("name is empty".into()));
    }
    if name != obj.name() {
        return Err(fail(format!("name does not match object metadata.name {:?}", obj.name())));
    }
    if node_budget_exceeded(obj.as_json(), cfg.max_nodes) {
        return Err(fail(format!("object too complex (>{} nodes)", cfg.max_nodes)));
    }

    let mut content = match cfg.format {
        ObjectFormat::Yaml => serde_yaml::to_string(obj.as_json())
            .map(String::into_bytes)
            .map_err(|e| fail(format!("yaml: {e}")))?,
        ObjectFormat::Json => serde_json::to_vec_pretty(obj.as_json()).map_err(|e| fail(format!("json: {e}")))?,
    };
    if !content.ends_with(b"\n") {
        content.push(b'\n');
    }
    if content.len() > cfg.max_bytes {
        return Err(fail(format!("encoded object too large ({} > {} bytes)", content.len(), cfg.max_bytes)));
    }

    Ok(RepositoryObject { name: name.to_string(), path: path.clone(), format: cfg.format, content })
}
