//! Spread kubehub – cluster connection and single-object retrieval

#![forbid(unsafe_code)]

use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use metrics::histogram;
use serde_json::Value as Json;
use tracing::{debug, info};

use kube::{
    api::Api,
    config::KubeConfigOptions,
    core::{ApiResource, DynamicObject, TypeMeta},
    discovery::{Discovery, Scope},
    Client, Config,
};
use spread_core::{BoxError, ClusterObject, ObjectFetcher, StageError};

/// Build a client for the given kubeconfig context, or the inferred/current one.
pub async fn client_for_context(context: Option<&str>) -> Result<Client> {
    let config = match context.filter(|c| !c.is_empty()) {
        Some(ctx) => {
            let opts = KubeConfigOptions { context: Some(ctx.to_string()), ..KubeConfigOptions::default() };
            Config::from_kubeconfig(&opts)
                .await
                .with_context(|| format!("loading kubeconfig context {ctx}"))?
        }
        None => Config::infer().await.context("inferring kube config")?,
    };
    Client::try_from(config).context("building kube client")
}

/// Discovery match: exact kind first, then the plural resource name or the kind
/// ignoring case.
fn matches_kind(ar: &ApiResource, kind: &str) -> bool {
    ar.kind.eq_ignore_ascii_case(kind) || ar.plural.eq_ignore_ascii_case(kind)
}

fn pick_resource<'a>(candidates: &'a [(ApiResource, bool)], kind: &str) -> Option<&'a (ApiResource, bool)> {
    candidates
        .iter()
        .find(|(ar, _)| ar.kind == kind)
        .or_else(|| candidates.iter().find(|(ar, _)| matches_kind(ar, kind)))
}

async fn find_api_resource(client: Client, kind: &str) -> Result<(ApiResource, bool)> {
    let discovery = Discovery::new(client).run().await.context("running API discovery")?;
    let mut candidates = Vec::new();
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            candidates.push((ar, matches!(caps.scope, Scope::Namespaced)));
        }
    }
    pick_resource(&candidates, kind)
        .cloned()
        .ok_or_else(|| anyhow!("resource kind not served by the cluster: {}", kind))
}

const EXPORT_METADATA_FIELDS: &[&str] = &[
    "uid",
    "resourceVersion",
    "generation",
    "creationTimestamp",
    "selfLink",
    "managedFields",
    "ownerReferences",
];

const EXPORT_ANNOTATIONS: &[&str] = &[
    "deployment.kubernetes.io/revision",
    "kubectl.kubernetes.io/last-applied-configuration",
];

/// Remove the fields that only make sense inside the originating cluster.
pub fn strip_export_noise(v: &mut Json) {
    if let Some(meta) = v.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        for f in EXPORT_METADATA_FIELDS {
            meta.remove(*f);
        }
        let now_empty = match meta.get_mut("annotations").and_then(|a| a.as_object_mut()) {
            Some(annos) => {
                for a in EXPORT_ANNOTATIONS {
                    annos.remove(*a);
                }
                annos.is_empty()
            }
            None => false,
        };
        if now_empty {
            meta.remove("annotations");
        }
    }
    // Status is server-populated
    if let Some(obj) = v.as_object_mut() {
        obj.remove("status");
    }
}

/// [`ObjectFetcher`] backed by a live cluster.
#[derive(Clone)]
pub struct KubeFetcher {
    client: Client,
}

impl KubeFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using an optional kubeconfig context.
    pub async fn connect(context: Option<&str>) -> Result<Self, StageError> {
        let client = client_for_context(context).await.map_err(|e| StageError::Connection {
            context: context.map(str::to_string),
            source: e.into(),
        })?;
        info!(context = context.unwrap_or("current"), "connected to cluster");
        Ok(Self::new(client))
    }

    async fn get(&self, kind: &str, name: &str, namespace: &str, export: bool) -> Result<ClusterObject> {
        let (ar, namespaced) = find_api_resource(self.client.clone(), kind).await?;
        let api: Api<DynamicObject> = if namespaced {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        };
        debug!(kind = %ar.kind, plural = %ar.plural, namespaced, name, namespace, "fetching object");
        let mut obj = api.get(name).await.with_context(|| format!("getting {} {}", ar.plural, name))?;
        if obj.types.is_none() {
            obj.types = Some(TypeMeta { api_version: ar.api_version.clone(), kind: ar.kind.clone() });
        }
        let mut raw = serde_json::to_value(&obj).context("serializing DynamicObject")?;
        if export {
            strip_export_noise(&mut raw);
        }
        Ok(ClusterObject::new(raw))
    }
}

#[async_trait::async_trait]
impl ObjectFetcher for KubeFetcher {
    async fn fetch(&self, kind: &str, name: &str, namespace: &str, export: bool) -> Result<ClusterObject, BoxError> {
        let started = Instant::now();
        let res = self.get(kind, name, namespace, export).await;
        histogram!("fetch_latency_ms", started.elapsed().as_secs_f64() * 1000.0);
        res.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ar(group: &str, kind: &str, plural: &str) -> ApiResource {
        let api_version = if group.is_empty() { "v1".to_string() } else { format!("{group}/v1") };
        ApiResource {
            group: group.into(),
            version: "v1".into(),
            api_version,
            kind: kind.into(),
            plural: plural.into(),
        }
    }

    #[test]
    fn export_strips_live_fields() {
        let mut v = json!({
            "apiVersion": "v1",
            "kind": "ReplicationController",
            "metadata": {
                "name": "mattermost",
                "namespace": "default",
                "uid": "0f6f7f1c-1111-2222-3333-444455556666",
                "resourceVersion": "123",
                "generation": 4,
                "creationTimestamp": "2020-01-01T00:00:00Z",
                "selfLink": "/api/v1/namespaces/default/replicationcontrollers/mattermost",
                "managedFields": [{ "manager": "kubectl" }],
                "labels": { "app": "mattermost" },
                "annotations": { "kubectl.kubernetes.io/last-applied-configuration": "{}" }
            },
            "spec": { "replicas": 1 },
            "status": { "replicas": 1 }
        });
        strip_export_noise(&mut v);
        let meta = v["metadata"].as_object().unwrap();
        for f in EXPORT_METADATA_FIELDS {
            assert!(!meta.contains_key(*f), "{f} kept");
        }
        assert!(!meta.contains_key("annotations"));
        assert_eq!(meta["labels"]["app"], json!("mattermost"));
        assert!(v.get("status").is_none());
        assert_eq!(v["spec"]["replicas"], json!(1));
    }

    #[test]
    fn export_keeps_user_annotations() {
        let mut v = json!({
            "metadata": { "name": "x", "annotations": { "team": "core", "deployment.kubernetes.io/revision": "3" } }
        });
        strip_export_noise(&mut v);
        assert_eq!(v["metadata"]["annotations"], json!({ "team": "core" }));
    }

    #[test]
    fn resource_lookup_prefers_exact_kind() {
        let candidates = vec![
            (ar("", "ReplicationController", "replicationcontrollers"), true),
            (ar("", "Pod", "pods"), true),
            (ar("", "Node", "nodes"), false),
            (ar("example.com", "pod", "pods"), true),
        ];
        assert_eq!(pick_resource(&candidates, "Pod").unwrap().0.group, "");
        assert_eq!(pick_resource(&candidates, "pod").unwrap().0.group, "example.com");
        assert_eq!(pick_resource(&candidates, "replicationcontrollers").unwrap().0.kind, "ReplicationController");
        assert!(!pick_resource(&candidates, "nodes").unwrap().1);
        assert!(pick_resource(&candidates, "Widget").is_none());
    }
}
