//! Connection settings for the Kubernetes API

use std::path::Path;

use tracing::{info, warn};

use crate::error::{OrchestrationError, Result};

/// Where a pod finds its service account credentials
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// How to reach the API server and which namespace to manage
#[derive(Debug, Clone)]
pub struct KubeConfig {
    /// Base URL of the API server
    pub api_url: String,
    /// Bearer token, if the server requires one
    pub token: Option<String>,
    /// PEM-encoded CA bundle for the API server certificate
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Namespace workloads are created in
    pub namespace: String,
}

impl KubeConfig {
    /// Explicit connection without credentials (e.g. via `kubectl proxy`)
    pub fn new(api_url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: None,
            ca_cert_pem: None,
            namespace: namespace.into(),
        }
    }

    /// Set bearer token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Configuration from the pod's service account
    ///
    /// # Errors
    /// Returns an error when not running inside a cluster or the credentials
    /// cannot be read.
    pub fn in_cluster(namespace: impl Into<String>) -> Result<Self> {
        Self::in_cluster_at(
            std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            std::env::var("KUBERNETES_SERVICE_PORT").ok(),
            Path::new(SERVICE_ACCOUNT_DIR),
            namespace,
        )
    }

    fn in_cluster_at(
        host: Option<String>,
        port: Option<String>,
        account_dir: &Path,
        namespace: impl Into<String>,
    ) -> Result<Self> {
        let host = host.ok_or_else(|| {
            OrchestrationError::Config("KUBERNETES_SERVICE_HOST is not set".to_string())
        })?;
        let port = port.unwrap_or_else(|| "443".to_string());

        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };

        let token = read_file(&account_dir.join("token"))?;
        let ca_cert_pem = read_file(&account_dir.join("ca.crt"))?;

        Ok(Self {
            api_url: format!("https://{host}:{port}"),
            token: Some(String::from_utf8_lossy(&token).trim().to_string()),
            ca_cert_pem: Some(ca_cert_pem),
            namespace: namespace.into(),
        })
    }

    /// In-cluster configuration, falling back to an explicit API URL
    #[must_use]
    pub fn infer(namespace: &str, fallback_url: &str, fallback_token: Option<String>) -> Self {
        match Self::in_cluster(namespace) {
            Ok(config) => {
                info!(api_url = %config.api_url, "using in-cluster Kubernetes configuration");
                config
            }
            Err(e) => {
                warn!(error = %e, api_url = %fallback_url, "in-cluster config unavailable, using explicit API URL");
                let config = Self::new(fallback_url, namespace);
                match fallback_token {
                    Some(token) => config.with_token(token),
                    None => config,
                }
            }
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| OrchestrationError::Io {
        path: path.display().to_string(),
        source,
    })
}
