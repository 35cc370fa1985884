use crate::client_config::ClientConfig;
use crate::rpc_client::{ConnectError, RpcClient};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;
use thiserror::Error;

pub const PROVIDER_GOOGLE: &str = "google";

const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_SCOPE: &str = "email";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth endpoint answered {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid auth url: {0}")]
    InvalidUrl(String),
    /// The external authorization step (browser redirect) did not yield a code.
    #[error("authorization flow failed: {0}")]
    Flow(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ClientIdResponse {
    #[serde(rename = "clientID")]
    client_id: String,
}

/// What the server returns for a successful code exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// The two plain HTTP calls that bootstrap a login. They do not go over the
/// multiplexed connection.
pub struct AuthClient {
    http: reqwest::Client,
    base: String,
}

impl AuthClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    pub fn with_http_client(config: &ClientConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base: config.http_base(),
        }
    }

    fn provider_url(&self, provider: &str, action: &str) -> String {
        format!("{}/api/auth/{}/{}", self.base, provider, action)
    }

    /// `GET /api/auth/{provider}/client_id`
    pub async fn get_oauth_client_id(&self, provider: &str) -> Result<String, AuthError> {
        tracing::debug!("get_oauth_client_id({:?})", provider);

        let response = self
            .http
            .get(self.provider_url(provider, "client_id"))
            .send()
            .await?;
        let body: ClientIdResponse = decode(response).await?;
        Ok(body.client_id)
    }

    /// `POST /api/auth/{provider}/authenticate?code=..&redirect_uri=..`
    pub async fn authenticate(
        &self,
        provider: &str,
        redirect_uri: &str,
        code: &str,
    ) -> Result<AuthResponse, AuthError> {
        tracing::debug!("authenticate({:?}, {:?})", provider, redirect_uri);

        let response = self
            .http
            .post(self.provider_url(provider, "authenticate"))
            .query(&[("code", code), ("redirect_uri", redirect_uri)])
            .send()
            .await?;
        decode(response).await
    }

    /// Runs the whole Google login: fetches the client id, hands the
    /// authorization URL to `authorize` (which performs the browser redirect
    /// and returns the code) and exchanges the code.
    pub async fn login<F, Fut>(
        &self,
        redirect_uri: &str,
        authorize: F,
    ) -> Result<AuthResponse, AuthError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String, AuthError>>,
    {
        let client_id = self.get_oauth_client_id(PROVIDER_GOOGLE).await?;
        let url = authorization_url(&client_id, redirect_uri)?;
        let code = authorize(url).await?;
        self.authenticate(PROVIDER_GOOGLE, redirect_uri, &code).await
    }
}

/// The Google consent page URL for `client_id`.
pub fn authorization_url(client_id: &str, redirect_uri: &str) -> Result<String, AuthError> {
    let url = Url::parse_with_params(
        GOOGLE_AUTHORIZATION_ENDPOINT,
        &[
            ("scope", GOOGLE_SCOPE),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("response_type", "code"),
        ],
    )
    .map_err(|err| AuthError::InvalidUrl(err.to_string()))?;
    Ok(url.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Auth endpoint answered {}: {}", status, body);
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}

/// Builds a connected client.
///
/// A stored token is used for the handshake when present; otherwise the
/// credentials already in `config` are used.
pub async fn create_logged_in_client(
    config: ClientConfig,
    stored_token: Option<String>,
) -> Result<RpcClient, ConnectError> {
    let config = match stored_token {
        Some(token) => config.with_token(token),
        None => {
            tracing::debug!("No stored token; connecting with configured credentials");
            config
        }
    };
    RpcClient::connect(config).await
}
