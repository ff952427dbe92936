//! Kubernetes core/v1 REST client

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use sprout_api::CreateIntent;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::KubeConfig;
use crate::error::{OrchestrationError, Result};
use crate::manifest::{self, Pod, PodList, Status};
use crate::traits::{Orchestrator, Workload};

/// Pod-level client for one namespace
#[derive(Debug, Clone)]
pub struct KubeClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    namespace: String,
}

impl KubeClient {
    /// Create a client from connection settings
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid or the CA bundle cannot be
    /// parsed.
    pub fn new(config: KubeConfig) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(pem) = &config.ca_cert_pem {
            for cert in reqwest::Certificate::from_pem_bundle(pem)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        Self::with_client(config, builder.build()?)
    }

    /// Create a client with a custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid.
    pub fn with_client(config: KubeConfig, client: Client) -> Result<Self> {
        let base_url = Url::parse(&config.api_url)?;
        if config.namespace.is_empty() {
            return Err(OrchestrationError::Config("namespace is empty".to_string()));
        }

        Ok(Self {
            client,
            base_url,
            token: config.token,
            namespace: config.namespace,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(OrchestrationError::Url)
    }

    fn pods_path(&self) -> String {
        format!("/api/v1/namespaces/{}/pods", self.namespace)
    }

    fn pod_path(&self, name: &str) -> String {
        format!("/api/v1/namespaces/{}/pods/{name}", self.namespace)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-2xx response into an `OrchestrationError::Api`
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: Status = serde_json::from_str(&body).unwrap_or_default();

        let reason = if parsed.reason.is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            parsed.reason
        };
        let message = if parsed.message.is_empty() {
            body
        } else {
            parsed.message
        };

        Err(OrchestrationError::Api {
            status: status.as_u16(),
            reason,
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Orchestrator for KubeClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    #[instrument(skip(self, intent), fields(container_id = %intent.container_id))]
    async fn create_workload(&self, intent: &CreateIntent) -> Result<Workload> {
        let url = self.url(&self.pods_path())?;
        let body = manifest::pod_manifest(intent);

        info!(namespace = %self.namespace, image = %intent.image, "creating pod");

        let pod: Pod = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        let workload = Workload::from(pod);

        info!(pod_name = %workload.name, uid = %workload.uid, "pod created");
        Ok(workload)
    }

    #[instrument(skip(self))]
    async fn find_workloads_by_container_id(&self, container_id: &str) -> Result<Vec<Workload>> {
        let mut url = self.url(&self.pods_path())?;
        url.query_pairs_mut()
            .append_pair("labelSelector", &manifest::container_selector(container_id));

        let list: PodList = self.send_json(self.request(Method::GET, url)).await?;
        debug!(count = list.items.len(), "listed pods by label");

        Ok(list.items.into_iter().map(Workload::from).collect())
    }

    #[instrument(skip(self))]
    async fn read_workload(&self, name: &str) -> Result<Option<Workload>> {
        let url = self.url(&self.pod_path(name))?;

        match self.send_json::<Pod>(self.request(Method::GET, url)).await {
            Ok(pod) => Ok(Some(pod.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn delete_workload(&self, name: &str, grace_period_seconds: u32) -> Result<()> {
        let url = self.url(&self.pod_path(name))?;
        let body = manifest::delete_options(grace_period_seconds);

        let response = self.request(Method::DELETE, url).json(&body).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            info!(pod_name = %name, "pod already deleted");
            return Ok(());
        }

        Self::check(response).await?;
        info!(pod_name = %name, "pod deletion initiated");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut url = self.url("/api/v1/namespaces")?;
        url.query_pairs_mut().append_pair("limit", "1");

        let response = self.request(Method::GET, url).send().await?;
        if let Err(e) = Self::check(response).await {
            warn!(error = %e, "Kubernetes API reachability check failed");
            return Err(e);
        }
        Ok(())
    }
}
