use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use eyre::{Context, Result};
use reqwest::Client as HttpClient;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

use crate::{
    models::{Component, ComponentsResponse, Incident, IncidentsResponse, Summary},
    providers::Provider,
};

/// Default timeout applied to every Statuspage request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of incident and component listings for the poller.
///
/// Implementations fail with transport, HTTP status or decoding errors; the
/// poller treats all of them as a failed attempt.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Unresolved incidents of `provider`.
    async fn unresolved_incidents(&self, provider: &Provider) -> Result<Vec<Incident>>;

    /// Current component statuses of `provider`.
    async fn components(&self, provider: &Provider) -> Result<Vec<Component>>;
}

#[async_trait]
impl<T: StatusSource + ?Sized> StatusSource for Arc<T> {
    async fn unresolved_incidents(&self, provider: &Provider) -> Result<Vec<Incident>> {
        (**self).unresolved_incidents(provider).await
    }

    async fn components(&self, provider: &Provider) -> Result<Vec<Component>> {
        (**self).components(provider).await
    }
}

/// Client for the public Statuspage v2 API.
#[derive(Debug, Clone)]
pub struct Client {
    http: HttpClient,
}

impl Client {
    /// Create a new client with a per-request `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .wrap_err_with(|| format!("GET {url}"))?
            .error_for_status()?;
        resp.json::<T>().await.wrap_err_with(|| format!("decoding response from {url}"))
    }

    /// Fetch the page summary of `provider`.
    pub async fn summary(&self, provider: &Provider) -> Result<Summary> {
        self.get_json(&provider.summary_url()).await
    }

    /// Subscribe `endpoint` to webhook notifications of `provider`. Returns the subscriber ID.
    pub async fn subscribe(&self, provider: &Provider, endpoint: &str, email: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Resp {
            id: String,
        }
        let url = provider.subscribers_url();
        let body = json!({ "subscriber": { "endpoint": endpoint, "email": email } });
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("POST {url}"))?
            .error_for_status()?;
        Ok(resp.json::<Resp>().await?.id)
    }

    /// Remove a webhook subscriber from `provider`.
    pub async fn unsubscribe(&self, provider: &Provider, subscriber_id: &str) -> Result<()> {
        let url = provider.subscriber_url(subscriber_id);
        self.http
            .delete(&url)
            .send()
            .await
            .wrap_err_with(|| format!("DELETE {url}"))?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl StatusSource for Client {
    async fn unresolved_incidents(&self, provider: &Provider) -> Result<Vec<Incident>> {
        let resp: IncidentsResponse = self.get_json(&provider.incidents_url()).await?;
        Ok(resp.incidents)
    }

    async fn components(&self, provider: &Provider) -> Result<Vec<Component>> {
        let resp: ComponentsResponse = self.get_json(&provider.components_url()).await?;
        Ok(resp.components)
    }
}
