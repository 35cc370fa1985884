use data_encoding::BASE64;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};

/// Path of the multiplexed stream endpoint on the server.
pub const WS_CONNECT_PATH: &str = "/api/my/wsconnect";

/// Latency emulated when talking to a local development server.
pub const LOCAL_ARTIFICIAL_DELAY: Duration = Duration::from_millis(150);

pub const ENV_SERVER: &str = "BOOKMUX_SERVER";
pub const ENV_USER: &str = "BOOKMUX_USER";
pub const ENV_PASSWORD: &str = "BOOKMUX_PASSWORD";
pub const ENV_TOKEN: &str = "BOOKMUX_TOKEN";
pub const ENV_ARTIFICIAL_DELAY_MS: &str = "BOOKMUX_ARTIFICIAL_DELAY_MS";

// Development account used until real credentials are configured.
const DEV_USER: &str = "alice";
const DEV_PASSWORD: &str = "alice";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid server address {server:?}: {reason}")]
    InvalidServer { server: String, reason: String },
}

/// Credentials embedded in the connecting URI.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { user: String, password: String },
    Token(String),
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::Basic {
            user: DEV_USER.to_string(),
            password: DEV_PASSWORD.to_string(),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host[:port]` of the server, without scheme.
    pub server: String,
    pub credentials: Credentials,
    /// Delay applied before each outbound write.
    pub artificial_delay: Duration,
}

/// 150 ms for servers addressed as `localhost...`, zero otherwise.
pub fn default_artificial_delay(server: &str) -> Duration {
    if server.starts_with("localhost") {
        LOCAL_ARTIFICIAL_DELAY
    } else {
        Duration::ZERO
    }
}

impl ClientConfig {
    pub fn new(server: impl Into<String>) -> Self {
        let server = server.into();
        let artificial_delay = default_artificial_delay(&server);
        Self {
            server,
            credentials: Credentials::default(),
            artificial_delay,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_credentials(Credentials::Token(token.into()))
    }

    pub fn with_artificial_delay(mut self, artificial_delay: Duration) -> Self {
        self.artificial_delay = artificial_delay;
        self
    }

    /// Reads the configuration from `BOOKMUX_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with a custom variable source.
    ///
    /// A token wins over a user/password pair; with neither, the development
    /// account is used.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = lookup(ENV_SERVER)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(ENV_SERVER))?;
        let mut config = Self::new(server);

        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
            config.credentials = Credentials::Token(token);
        } else if let Some(user) = lookup(ENV_USER) {
            let password = lookup(ENV_PASSWORD).ok_or(ConfigError::Missing(ENV_PASSWORD))?;
            config.credentials = Credentials::Basic { user, password };
        }

        if let Some(raw) = lookup(ENV_ARTIFICIAL_DELAY_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: ENV_ARTIFICIAL_DELAY_MS,
                value: raw.clone(),
            })?;
            config.artificial_delay = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Base URL of the plain HTTP API, e.g. `http://localhost:4000`.
    pub fn http_base(&self) -> String {
        format!("http://{}", self.server)
    }

    /// The stream endpoint, e.g. `ws://localhost:4000/api/my/wsconnect`.
    pub fn ws_url(&self) -> Result<Url, ConfigError> {
        let raw = format!("ws://{}{}", self.server, WS_CONNECT_PATH);
        Url::parse(&raw).map_err(|err| ConfigError::InvalidServer {
            server: self.server.clone(),
            reason: err.to_string(),
        })
    }

    /// The handshake request carrying the credentials.
    ///
    /// A token travels as the `token` query value. A user/password pair is
    /// sent the way a browser sends `ws://user:password@server/...`: as a
    /// Basic `Authorization` header.
    pub fn handshake_request(&self) -> Result<Request, ConfigError> {
        let mut url = self.ws_url()?;
        if let Credentials::Token(token) = &self.credentials {
            url.query_pairs_mut().append_pair("token", token);
        }

        let invalid = |err: &dyn std::fmt::Display| ConfigError::InvalidServer {
            server: self.server.clone(),
            reason: err.to_string(),
        };

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|err| invalid(&err))?;

        if let Credentials::Basic { user, password } = &self.credentials {
            let encoded = BASE64.encode(format!("{user}:{password}").as_bytes());
            let value = HeaderValue::from_str(&format!("Basic {encoded}")).map_err(|err| {
                ConfigError::Invalid {
                    key: ENV_USER,
                    value: err.to_string(),
                }
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }
}
