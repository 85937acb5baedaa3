//! Loads Kubernetes resources from YAML manifests into the index.

use anyhow::{Context, Result};
use ingress_policy_k8s_api::{networking_v1, networking_v1beta1, Service};
use ingress_policy_k8s_index::Index;
use kubert::index::IndexNamespacedResource;
use serde::{de::DeserializeOwned, Deserialize};
use serde_yaml::Value;
use std::path::Path;

/// Reads a manifest file, or stdin when the path is `-`.
pub fn read(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Applies every supported resource in a multi-document YAML stream to the
/// index and returns the number of resources applied.
///
/// Resources without a namespace are placed in `namespace`. `List` documents
/// are expanded and unsupported kinds are skipped.
pub fn load(index: &mut Index, manifests: &str, namespace: &str) -> Result<usize> {
    let mut applied = 0;
    for (i, doc) in serde_yaml::Deserializer::from_str(manifests).enumerate() {
        let value = Value::deserialize(doc).with_context(|| format!("invalid document {i}"))?;
        applied += load_value(index, value, namespace)
            .with_context(|| format!("invalid document {i}"))?;
    }
    Ok(applied)
}

fn load_value(index: &mut Index, value: Value, namespace: &str) -> Result<usize> {
    // Empty documents, e.g. after a trailing `---`.
    if value.is_null() {
        return Ok(0);
    }

    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let (api_version, kind) = (field("apiVersion"), field("kind"));
    match (api_version.as_str(), kind.as_str()) {
        ("networking.k8s.io/v1", "Ingress") => {
            apply::<networking_v1::Ingress>(index, value, namespace)?;
        }
        ("networking.k8s.io/v1beta1", "Ingress") => {
            apply::<networking_v1beta1::Ingress>(index, value, namespace)?;
        }
        ("v1", "Service") => {
            apply::<Service>(index, value, namespace)?;
        }
        ("v1", "List") => {
            let Some(Value::Sequence(items)) = value.get("items").cloned() else {
                return Ok(0);
            };
            let mut applied = 0;
            for item in items {
                applied += load_value(index, item, namespace)?;
            }
            return Ok(applied);
        }
        (api_version, kind) => {
            tracing::debug!(%api_version, %kind, "Skipping unsupported resource");
            return Ok(0);
        }
    }
    Ok(1)
}

fn apply<T>(index: &mut Index, value: Value, namespace: &str) -> Result<()>
where
    T: kube::Resource + DeserializeOwned,
    Index: IndexNamespacedResource<T>,
{
    let mut resource = serde_yaml::from_value::<T>(value)?;
    resource
        .meta_mut()
        .namespace
        .get_or_insert_with(|| namespace.to_string());
    index.apply(resource);
    Ok(())
}
