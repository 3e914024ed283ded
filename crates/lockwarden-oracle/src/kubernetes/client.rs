//! Kubernetes client construction
//!
//! Defaults to the pod's service account, with the CA bundle and token paths
//! overridable. The credentials are expressed as a one-cluster kubeconfig so
//! kube handles certificate parsing and token refresh.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use lockwarden_common::Configuration;
use tracing::{debug, info};

const CONTEXT_NAME: &str = "lockwarden";

/// Connection settings for the liveness oracle
#[derive(Debug, Clone)]
pub struct KubeClientSettings {
    /// API server URL; `None` means derive it from `KUBERNETES_SERVICE_HOST`/`_PORT`
    pub api_server: Option<String>,
    pub ca_path: String,
    pub token_path: String,
    pub request_timeout: Duration,
}

impl KubeClientSettings {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        Self {
            api_server: configuration.oracle_api_server(),
            ca_path: configuration.oracle_ca_path(),
            token_path: configuration.oracle_token_path(),
            request_timeout: configuration.oracle_request_timeout(),
        }
    }

    /// Resolve the API server URL
    pub fn server_url(&self) -> anyhow::Result<String> {
        if let Some(server) = &self.api_server {
            return Ok(server.clone());
        }

        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .context("KUBERNETES_SERVICE_HOST is not set, not running inside a cluster")?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
        Ok(in_cluster_url(&host, &port))
    }

    /// Render the single-context kubeconfig for these settings.
    ///
    /// Credential files that do not exist are left out, so a plain-HTTP or
    /// anonymous API server can be used in development.
    fn kubeconfig_yaml(&self, server: &str) -> String {
        let mut cluster = format!("    server: {:?}\n", server);
        if Path::new(&self.ca_path).exists() {
            cluster.push_str(&format!("    certificate-authority: {:?}\n", self.ca_path));
        }

        let user = if Path::new(&self.token_path).exists() {
            format!("    tokenFile: {:?}\n", self.token_path)
        } else {
            "    {}\n".to_string()
        };

        format!(
            "apiVersion: v1\n\
             kind: Config\n\
             clusters:\n\
             - name: {ctx}\n  cluster:\n{cluster}\
             users:\n\
             - name: {ctx}\n  user:\n{user}\
             contexts:\n\
             - name: {ctx}\n  context:\n    cluster: {ctx}\n    user: {ctx}\n\
             current-context: {ctx}\n",
            ctx = CONTEXT_NAME,
            cluster = cluster,
            user = user,
        )
    }
}

fn in_cluster_url(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("https://[{}]:{}", host, port)
    } else {
        format!("https://{}:{}", host, port)
    }
}

/// Build a Kubernetes client from the oracle settings
pub async fn build_client(settings: &KubeClientSettings) -> anyhow::Result<Client> {
    let server = settings.server_url()?;
    info!(
        api_server = %server,
        ca_path = %settings.ca_path,
        token_path = %settings.token_path,
        "Creating Kubernetes client"
    );

    let yaml = settings.kubeconfig_yaml(&server);
    debug!(kubeconfig = %yaml, "Generated oracle kubeconfig");

    let kubeconfig = Kubeconfig::from_yaml(&yaml).context("invalid generated kubeconfig")?;
    let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("failed to load Kubernetes credentials")?;
    config.connect_timeout = Some(settings.request_timeout);
    config.read_timeout = Some(settings.request_timeout);

    Client::try_from(config).context("failed to create Kubernetes client")
}
