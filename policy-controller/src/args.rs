use crate::manifest;
use anyhow::{Context, Result};
use clap::Parser;
use ingress_policy_core::{ingress_traffic_policy, ApiVersion, MeshService, PolicyConfig};
use ingress_policy_k8s_index::Index;
use std::{io::Write, path::PathBuf};

#[derive(Debug, Parser)]
#[clap(
    name = "ingress-policy",
    about = "Builds the ingress traffic policy of a meshed service from Kubernetes manifests"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "ingress_policy=info,warn",
        env = "INGRESS_POLICY_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    /// The service to build policy for, as `<namespace>/<name>`.
    #[clap(long)]
    service: MeshService,

    #[clap(long, default_value = "cluster.local")]
    cluster_domain: String,

    /// The namespace of manifest resources that do not set one.
    #[clap(long, default_value = "default")]
    namespace: String,

    /// The Ingress API versions that the cluster serves.
    #[clap(long, value_delimiter = ',', default_value = "v1,v1beta1")]
    api_versions: Vec<ApiVersion>,

    /// Ingress traffic reaches services over TLS.
    #[clap(long)]
    https_ingress: bool,

    /// Ingress backends are configured with IngressBackend resources.
    #[clap(long)]
    ingress_backend_policy: bool,

    /// YAML manifest files. `-` reads from stdin.
    #[clap(required = true)]
    manifests: Vec<PathBuf>,
}

// === impl Args ===

impl Args {
    #[inline]
    pub fn parse_and_run() -> Result<()> {
        Self::parse().run()
    }

    pub fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            service,
            cluster_domain,
            namespace,
            api_versions,
            https_ingress,
            ingress_backend_policy,
            manifests,
        } = self;

        log_format.try_init(log_level)?;

        let svc = MeshService::new(service.name, service.namespace, &cluster_domain);
        let config = PolicyConfig {
            https_ingress,
            ingress_backend_policy,
        };

        let mut index = Index::new(api_versions);
        for path in &manifests {
            let docs = manifest::read(path)?;
            let applied = manifest::load(&mut index, &docs, &namespace)
                .with_context(|| format!("failed to load manifests from {}", path.display()))?;
            tracing::debug!(path = %path.display(), applied, "Loaded manifests");
        }

        let outcome = ingress_traffic_policy(&svc, config, &index, &index)?;
        for diagnostic in &outcome.diagnostics {
            tracing::debug!(%svc, %diagnostic);
        }
        tracing::info!(
            %svc,
            configured = outcome.policy.is_some(),
            diagnostics = outcome.diagnostics.len(),
            "Built ingress policy"
        );

        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &outcome)?;
        writeln!(stdout)?;
        Ok(())
    }
}
