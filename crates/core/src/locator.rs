//! `<kind>/<name>` reference parsing.

use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::kinds::canonicalize;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceReference {
    pub kind: String,
    pub name: String,
}

impl ResourceReference {
    /// Same reference with the kind expanded through the alias table.
    pub fn canonical(&self) -> Self {
        Self { kind: canonicalize(&self.kind).to_string(), name: self.name.clone() }
    }
}

impl std::fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

impl std::str::FromStr for ResourceReference {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Split `reference` on `/` into exactly two non-empty parts.
pub fn parse(reference: &str) -> Result<ResourceReference, StageError> {
    let malformed = |reason| StageError::MalformedReference { reference: reference.to_string(), reason };
    if reference.is_empty() {
        return Err(malformed("a resource to be added must be specified"));
    }
    let parts: Vec<&str> = reference.split('/').collect();
    match parts.as_slice() {
        [kind, name] if !kind.is_empty() && !name.is_empty() => {
            Ok(ResourceReference { kind: (*kind).to_string(), name: (*name).to_string() })
        }
        [_, _] => Err(malformed("kind and name must both be non-empty")),
        _ => Err(malformed("expected <kind>/<name>")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_and_name() {
        let r = parse("rc/mattermost").unwrap();
        assert_eq!(r, ResourceReference { kind: "rc".into(), name: "mattermost".into() });
        assert_eq!(r.to_string(), "rc/mattermost");
        assert_eq!(r.canonical().kind, "ReplicationController");
        assert_eq!(r.canonical().name, "mattermost");
    }

    #[test]
    fn rejects_wrong_part_counts() {
        for bad in ["", "rc", "rc/a/b", "/", "rc/", "/mattermost", "a//b"] {
            let err = parse(bad).unwrap_err();
            assert!(matches!(err, StageError::MalformedReference { .. }), "{bad:?} -> {err}");
        }
    }

    #[test]
    fn from_str_matches_parse() {
        let r: ResourceReference = "svc/web".parse().unwrap();
        assert_eq!(r.kind, "svc");
        assert!("svc".parse::<ResourceReference>().is_err());
    }
}
