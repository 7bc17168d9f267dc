//! Live and normalized object representations.

use serde_json::{Map, Value as Json};

use crate::error::StageError;

/// Schema version every staged object is pinned to.
pub const BASELINE_VERSION: &str = "v1";

/// Object as returned by the cluster. Owned by the pipeline for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterObject {
    raw: Json,
}

impl ClusterObject {
    pub fn new(raw: Json) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Json {
        &self.raw
    }

    pub fn api_version(&self) -> Option<&str> {
        self.raw.get("apiVersion").and_then(|v| v.as_str())
    }

    pub fn kind(&self) -> Option<&str> {
        self.raw.get("kind").and_then(|v| v.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.raw.get("metadata").and_then(|m| m.get("name")).and_then(|v| v.as_str())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.raw.get("metadata").and_then(|m| m.get("namespace")).and_then(|v| v.as_str())
    }
}

impl From<Json> for ClusterObject {
    fn from(raw: Json) -> Self {
        Self::new(raw)
    }
}

/// A [`ClusterObject`] with its version pinned to [`BASELINE_VERSION`] and its
/// namespace set to the requested one. Only [`normalize`] builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedObject {
    kind: String,
    namespace: String,
    name: String,
    raw: Json,
}

impl NormalizedObject {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api_version(&self) -> &str {
        self.raw.get("apiVersion").and_then(|v| v.as_str()).unwrap_or(BASELINE_VERSION)
    }

    pub fn as_json(&self) -> &Json {
        &self.raw
    }
}

/// Keep the API group, replace the version with the baseline.
fn pin_api_version(api_version: Option<&str>) -> String {
    match api_version.and_then(|av| av.split_once('/')) {
        Some((group, _)) if !group.is_empty() => format!("{group}/{BASELINE_VERSION}"),
        _ => BASELINE_VERSION.to_string(),
    }
}

#[cfg(feature = "strip-managed-fields")]
fn strip_managed_fields(meta: &mut Map<String, Json>) {
    meta.remove("managedFields");
}

#[cfg(not(feature = "strip-managed-fields"))]
fn strip_managed_fields(_meta: &mut Map<String, Json>) {}

/// Produce the normalized form of `obj` for `namespace`. Pure: `obj` is left untouched.
pub fn normalize(obj: &ClusterObject, namespace: &str) -> Result<NormalizedObject, StageError> {
    let name = obj
        .name()
        .filter(|n| !n.is_empty())
        .ok_or(StageError::Normalization { field: "metadata.name" })?
        .to_string();
    let kind = obj.kind().unwrap_or_default().to_string();

    let mut raw = obj.raw().clone();
    let top = raw.as_object_mut().ok_or(StageError::Normalization { field: "object body" })?;
    top.insert("apiVersion".into(), Json::String(pin_api_version(obj.api_version())));
    let meta = top
        .get_mut("metadata")
        .and_then(|m| m.as_object_mut())
        .ok_or(StageError::Normalization { field: "metadata" })?;
    meta.insert("namespace".into(), Json::String(namespace.to_string()));
    strip_managed_fields(meta);

    Ok(NormalizedObject { kind, namespace: namespace.to_string(), name, raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rc(api_version: &str, ns: Option<&str>) -> ClusterObject {
        let mut v = json!({
            "apiVersion": api_version,
            "kind": "ReplicationController",
            "metadata": {
                "name": "mattermost",
                "managedFields": [{ "manager": "kubectl" }],
                "labels": { "app": "mattermost" }
            },
            "spec": { "replicas": 2 }
        });
        if let Some(ns) = ns {
            v["metadata"]["namespace"] = json!(ns);
        }
        ClusterObject::new(v)
    }

    #[test]
    fn pins_version_and_stamps_namespace() {
        let live = rc("v1beta3", None);
        let n = normalize(&live, "default").unwrap();
        assert_eq!(n.api_version(), "v1");
        assert_eq!(n.namespace(), "default");
        assert_eq!(n.name(), "mattermost");
        assert_eq!(n.kind(), "ReplicationController");
        assert_eq!(n.as_json()["metadata"]["namespace"], json!("default"));
        assert_eq!(n.as_json()["spec"]["replicas"], json!(2));
        // live copy untouched
        assert_eq!(live.api_version(), Some("v1beta3"));
        assert_eq!(live.namespace(), None);
    }

    #[test]
    fn keeps_group_when_pinning() {
        let n = normalize(&rc("apps/v1beta2", Some("prod")), "staging").unwrap();
        assert_eq!(n.api_version(), "apps/v1");
        assert_eq!(n.namespace(), "staging");
    }

    #[test]
    fn missing_api_version_gets_baseline() {
        let obj = ClusterObject::new(json!({ "kind": "ConfigMap", "metadata": { "name": "x" } }));
        assert_eq!(normalize(&obj, "default").unwrap().api_version(), BASELINE_VERSION);
    }

    #[cfg(feature = "strip-managed-fields")]
    #[test]
    fn drops_managed_fields() {
        let n = normalize(&rc("v1", None), "default").unwrap();
        assert!(n.as_json()["metadata"].get("managedFields").is_none());
        assert_eq!(n.as_json()["metadata"]["labels"]["app"], json!("mattermost"));
    }

    #[test]
    fn is_deterministic() {
        let live = rc("v1", Some("other"));
        assert_eq!(normalize(&live, "default").unwrap(), normalize(&live, "default").unwrap());
    }

    #[test]
    fn requires_a_name() {
        let nameless = ClusterObject::new(json!({ "kind": "Pod", "metadata": {} }));
        assert!(matches!(normalize(&nameless, "default"), Err(StageError::Normalization { .. })));
        let empty = ClusterObject::new(json!({ "kind": "Pod", "metadata": { "name": "" } }));
        assert!(matches!(normalize(&empty, "default"), Err(StageError::Normalization { .. })));
        let scalar = ClusterObject::new(json!("nope"));
        assert!(matches!(normalize(&scalar, "default"), Err(StageError::Normalization { .. })));
    }
}
