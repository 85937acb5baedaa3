use crate::{ingress, service};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use anyhow::Result;
use ingress_policy_core::{
    ApiVersion, IngressObject, IngressPolicyOutcome, IngressProvider, MeshService, PolicyConfig,
    PortProtocolResolver, PortProtocols,
};
use ingress_policy_k8s_api::{networking_v1, networking_v1beta1, ResourceExt, Service};
use parking_lot::RwLock;
use std::sync::Arc;

/// Holds the ingress resources and services of a cluster, by namespace.
#[derive(Debug)]
pub struct Index {
    /// The Ingress API versions that the cluster serves.
    served: HashSet<ApiVersion>,
    namespaces: HashMap<String, Namespace>,
}

pub type SharedIndex = Arc<RwLock<Index>>;

/// Supports concurrent lookups against a shared index.
///
/// Each lookup reads from one consistent state of the index.
#[derive(Clone, Debug)]
pub struct Reader(SharedIndex);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("the cluster does not serve the {0} Ingress API")]
    ApiNotServed(ApiVersion),

    #[error("service {0} not found")]
    ServiceNotFound(String),
}

#[derive(Debug, Default)]
struct Namespace {
    v1: HashMap<String, IngressObject>,
    v1beta1: HashMap<String, IngressObject>,
    services: HashMap<String, PortProtocols>,
}

// === impl Index ===

impl Index {
    pub fn new(served: impl IntoIterator<Item = ApiVersion>) -> Self {
        Self {
            served: served.into_iter().collect(),
            namespaces: HashMap::default(),
        }
    }

    /// Wraps the index so that it may be updated and read concurrently.
    pub fn shared(self) -> (Reader, SharedIndex) {
        let index = Arc::new(RwLock::new(self));
        (Reader(index.clone()), index)
    }

    fn apply_ingress(&mut self, version: ApiVersion, ingress: IngressObject) {
        tracing::debug!(%version, namespace = %ingress.namespace, name = %ingress.name, "Indexing ingress");
        let ns = self.namespaces.entry(ingress.namespace.clone()).or_default();
        ns.ingresses_mut(version).insert(ingress.name.clone(), ingress);
    }

    fn delete_ingress(&mut self, version: ApiVersion, namespace: &str, name: &str) {
        if let Some(ns) = self.namespaces.get_mut(namespace) {
            if ns.ingresses_mut(version).remove(name).is_some() {
                tracing::debug!(%version, namespace, name, "Removed ingress");
            }
            if ns.is_empty() {
                self.namespaces.remove(namespace);
            }
        }
    }
}

impl IngressProvider for Index {
    fn list_ingresses(&self, version: ApiVersion, svc: &MeshService) -> Result<Vec<IngressObject>> {
        if !self.served.contains(&version) {
            return Err(IndexError::ApiNotServed(version).into());
        }

        let Some(ns) = self.namespaces.get(&svc.namespace) else {
            return Ok(vec![]);
        };

        let mut ingresses = ns
            .ingresses(version)
            .values()
            .filter(|ingress| ingress.references(svc))
            .cloned()
            .collect::<Vec<_>>();
        // Routes are merged in the order ingresses are listed, so the order
        // must not depend on the map.
        ingresses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ingresses)
    }
}

impl PortProtocolResolver for Index {
    fn target_port_protocols(&self, svc: &MeshService) -> Result<PortProtocols> {
        self.namespaces
            .get(&svc.namespace)
            .and_then(|ns| ns.services.get(&svc.name))
            .cloned()
            .ok_or_else(|| IndexError::ServiceNotFound(svc.to_string()).into())
    }
}

impl kubert::index::IndexNamespacedResource<networking_v1::Ingress> for Index {
    fn apply(&mut self, ingress: networking_v1::Ingress) {
        let name = ingress.name_unchecked();
        match ingress::from_v1(ingress) {
            Some(ingress) => self.apply_ingress(ApiVersion::V1, ingress),
            None => tracing::warn!(%name, "Ignoring ingress without a namespace"),
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_ingress(ApiVersion::V1, &namespace, &name)
    }
}

impl kubert::index::IndexNamespacedResource<networking_v1beta1::Ingress> for Index {
    fn apply(&mut self, ingress: networking_v1beta1::Ingress) {
        let name = ingress.name_unchecked();
        match ingress::from_v1beta1(ingress) {
            Some(ingress) => self.apply_ingress(ApiVersion::V1beta1, ingress),
            None => tracing::warn!(%name, "Ignoring ingress without a namespace"),
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_ingress(ApiVersion::V1beta1, &namespace, &name)
    }
}

impl kubert::index::IndexNamespacedResource<Service> for Index {
    fn apply(&mut self, svc: Service) {
        let name = svc.name_unchecked();
        let Some(namespace) = svc.namespace() else {
            tracing::warn!(%name, "Ignoring service without a namespace");
            return;
        };

        let ports = svc
            .spec
            .as_ref()
            .map(service::port_protocols)
            .unwrap_or_default();
        tracing::debug!(%namespace, %name, ports = ports.len(), "Indexing service");
        self.namespaces
            .entry(namespace)
            .or_default()
            .services
            .insert(name, ports);
    }

    fn delete(&mut self, namespace: String, name: String) {
        if let Some(ns) = self.namespaces.get_mut(&namespace) {
            ns.services.remove(&name);
            if ns.is_empty() {
                self.namespaces.remove(&namespace);
            }
        }
    }
}

// === impl Namespace ===

impl Namespace {
    fn ingresses(&self, version: ApiVersion) -> &HashMap<String, IngressObject> {
        match version {
            ApiVersion::V1 => &self.v1,
            ApiVersion::V1beta1 => &self.v1beta1,
        }
    }

    fn ingresses_mut(&mut self, version: ApiVersion) -> &mut HashMap<String, IngressObject> {
        match version {
            ApiVersion::V1 => &mut self.v1,
            ApiVersion::V1beta1 => &mut self.v1beta1,
        }
    }

    fn is_empty(&self) -> bool {
        self.v1.is_empty() && self.v1beta1.is_empty() && self.services.is_empty()
    }
}

// === impl Reader ===

impl Reader {
    /// Builds the ingress traffic policy for a service from a single snapshot
    /// of the index. Updates are held off until the policy is built.
    pub fn ingress_traffic_policy(
        &self,
        svc: &MeshService,
        config: PolicyConfig,
    ) -> Result<IngressPolicyOutcome> {
        let index = self.0.read();
        ingress_policy_core::ingress_traffic_policy(svc, config, &*index, &*index)
    }
}
