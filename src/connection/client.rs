use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

use super::auth::TokenStore;
use super::environment::{Environment, EnvironmentResponse};
use crate::endpoints::{McEndpoint, host_key, resolve_mc_endpoint};
use crate::errors::ConnectionError;
use crate::project::ProjectInfo;

/// The REST calls a connection depends on.
/// Real implementation: `MicroclimateClient`. Tests use in-process fakes.
#[async_trait]
pub trait MicroclimateApi: Send + Sync {
    async fn get_environment(&self, mc_uri: &Url) -> Result<Environment, ConnectionError>;

    async fn get_projects(&self, mc_uri: &Url) -> Result<Vec<ProjectInfo>, ConnectionError>;
}

/// reqwest-backed client for a Microclimate server's REST API.
///
/// Requests carry a bearer token when one is stored for the server's host.
/// No timeout or retry is applied; failures go straight back to the caller.
#[derive(Debug, Clone)]
pub struct MicroclimateClient {
    http: reqwest::Client,
    tokens: Arc<TokenStore>,
}

impl MicroclimateClient {
    pub fn new(tokens: Arc<TokenStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
        }
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .request(method, url.clone())
            .header("User-Agent", "mctools");
        match self.tokens.tokens_for(&host_key(&url)) {
            Some(tokens) => builder.bearer_auth(tokens.access_token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<reqwest::Response, ConnectionError> {
        let resp = builder.send().await.map_err(|source| ConnectionError::Request {
            url: url.to_string(),
            source,
        })?;
        if !resp.status().is_success() {
            return Err(ConnectionError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ConnectionError> {
        let resp = self.send(self.request(Method::GET, url.clone()), &url).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ConnectionError::BadResponse {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// Fire a project action. Only the status code of the response matters.
    pub(crate) async fn send_action(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<(), ConnectionError> {
        tracing::debug!(%method, %url, "Sending project action");
        let mut builder = self.request(method, url.clone());
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        self.send(builder, &url).await?;
        Ok(())
    }
}

#[async_trait]
impl MicroclimateApi for MicroclimateClient {
    async fn get_environment(&self, mc_uri: &Url) -> Result<Environment, ConnectionError> {
        let url = resolve_mc_endpoint(mc_uri, McEndpoint::Environment)?;
        let response: EnvironmentResponse = self.get_json(url.clone()).await?;
        Environment::from_response(url.as_str(), response)
    }

    async fn get_projects(&self, mc_uri: &Url) -> Result<Vec<ProjectInfo>, ConnectionError> {
        let url = resolve_mc_endpoint(mc_uri, McEndpoint::Projects)?;
        self.get_json(url).await
    }
}
