#![forbid(unsafe_code)]

use std::collections::HashMap;

use spread_core::{canonicalize, parse, RepositoryPath, StageError};

const KINDS: &[&str] = &["ReplicationController", "Service", "ConfigMap", "configmap", "Secret"];
const NAMESPACES: &[&str] = &["default", "kube-system", "prod", "a", "a.b"];
const NAMES: &[&str] = &["mattermost", "web", "a", "a.b", "a-b", "default"];

#[test]
fn same_identity_resolves_to_same_path() {
    for kind in KINDS {
        for ns in NAMESPACES {
            for name in NAMES {
                let a = RepositoryPath::from_identity(kind, ns, name).unwrap();
                let b = RepositoryPath::from_identity(kind, ns, name).unwrap();
                assert_eq!(a, b);
                assert_eq!(a.to_string(), b.to_string());
            }
        }
    }
    // stable across runs: the layout itself is fixed
    let p = RepositoryPath::from_identity("ReplicationController", "default", "mattermost").unwrap();
    assert_eq!(p.to_string(), "default/ReplicationController/mattermost");
}

#[test]
fn distinct_identities_never_collide() {
    let mut seen: HashMap<String, (&str, &str, &str)> = HashMap::new();
    for &kind in KINDS {
        for &ns in NAMESPACES {
            for &name in NAMES {
                let p = RepositoryPath::from_identity(kind, ns, name).unwrap().to_string();
                if let Some(prev) = seen.insert(p.clone(), (kind, ns, name)) {
                    panic!("{p} produced by both {prev:?} and {:?}", (kind, ns, name));
                }
            }
        }
    }
    assert_eq!(seen.len(), KINDS.len() * NAMESPACES.len() * NAMES.len());
}

#[test]
fn separator_smuggling_is_rejected() {
    // ("a/b", "c") and ("a", "b/c") would join to the same string
    assert!(matches!(
        RepositoryPath::from_identity("Pod", "a/b", "c"),
        Err(StageError::PathResolution { component: "namespace", .. })
    ));
    assert!(matches!(
        RepositoryPath::from_identity("Pod", "a", "b/c"),
        Err(StageError::PathResolution { component: "name", .. })
    ));
}

#[test]
fn locator_is_strict() {
    let r = parse("rc/mattermost").unwrap();
    assert_eq!((r.kind.as_str(), r.name.as_str()), ("rc", "mattermost"));
    for bad in ["rc", "rc/a/b", ""] {
        assert!(matches!(parse(bad), Err(StageError::MalformedReference { .. })), "{bad:?}");
    }
}

#[test]
fn aliases_canonicalize_and_unknowns_pass_through() {
    assert_eq!(canonicalize("rc"), "ReplicationController");
    assert_eq!(canonicalize("Widget"), "Widget");
}
