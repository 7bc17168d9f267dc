//! Deterministic repository paths: `<namespace>/<Kind>/<name>`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::StageError;
use crate::object::NormalizedObject;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryPath {
    segments: SmallVec<[String; 3]>,
}

impl RepositoryPath {
    /// Build the path for an identity triple, validating every component.
    pub fn from_identity(kind: &str, namespace: &str, name: &str) -> Result<Self, StageError> {
        check_segment("namespace", namespace)?;
        check_segment("kind", kind)?;
        check_segment("name", name)?;
        let mut segments = SmallVec::new();
        segments.push(namespace.to_string());
        segments.push(kind.to_string());
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl std::fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

fn check_segment(component: &'static str, value: &str) -> Result<(), StageError> {
    let reason = if value.is_empty() {
        Some("is empty")
    } else if value == "." || value == ".." {
        Some("is a relative path component")
    } else if value.chars().any(|c| c == '/' || c == '\\') {
        Some("contains a path separator")
    } else if value.chars().any(char::is_control) {
        Some("contains a control character")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StageError::PathResolution { component, value: value.to_string(), reason }),
        None => Ok(()),
    }
}

/// Path for a normalized object. Depends only on its kind, namespace and name.
pub fn resolve_path(obj: &NormalizedObject) -> Result<RepositoryPath, StageError> {
    RepositoryPath::from_identity(obj.kind(), obj.namespace(), obj.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{normalize, ClusterObject};
    use serde_json::json;

    #[test]
    fn layout_is_namespace_kind_name() {
        let p = RepositoryPath::from_identity("ReplicationController", "default", "mattermost").unwrap();
        assert_eq!(p.to_string(), "default/ReplicationController/mattermost");
        assert_eq!(p.segments().len(), 3);
    }

    #[test]
    fn ignores_content() {
        let a = ClusterObject::new(json!({
            "kind": "ConfigMap",
            "metadata": { "name": "cfg", "resourceVersion": "1" },
            "data": { "k": "a" }
        }));
        let b = ClusterObject::new(json!({
            "kind": "ConfigMap",
            "metadata": { "name": "cfg", "resourceVersion": "99", "creationTimestamp": "2020-01-01T00:00:00Z" },
            "data": { "k": "b" }
        }));
        let pa = resolve_path(&normalize(&a, "ns").unwrap()).unwrap();
        let pb = resolve_path(&normalize(&b, "ns").unwrap()).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn rejects_illegal_components() {
        let cases = [
            ("", "default", "x"),
            ("Pod", "", "x"),
            ("Pod", "default", ""),
            ("Pod", "..", "x"),
            ("Pod", "default", "."),
            ("Pod", "default", "a/b"),
            ("Pod", "default", "a\\b"),
            ("Pod", "def\nault", "x"),
            ("Po\0d", "default", "x"),
        ];
        for (kind, ns, name) in cases {
            let err = RepositoryPath::from_identity(kind, ns, name).unwrap_err();
            assert!(matches!(err, StageError::PathResolution { .. }), "{kind:?}/{ns:?}/{name:?}");
        }
    }

    #[test]
    fn missing_kind_fails_resolution() {
        let obj = normalize(&ClusterObject::new(json!({ "metadata": { "name": "x" } })), "default").unwrap();
        let err = resolve_path(&obj).unwrap_err();
        assert!(matches!(err, StageError::PathResolution { component: "kind", .. }));
    }
}
