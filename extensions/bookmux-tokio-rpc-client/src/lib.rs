//! Tokio WebSocket transport and typed client for the bookmux RPC protocol.
//!
//! [`RpcClient`] is the entry point; it owns a [`ConnectionManager`] and the
//! request correlator from the `bookmux` crate. The [`auth`] module holds the
//! plain HTTP login bootstrap.

pub mod auth;
mod client_config;
mod connection_manager;
mod rpc_client;

pub use client_config::{
    ClientConfig, ConfigError, Credentials, ENV_ARTIFICIAL_DELAY_MS, ENV_PASSWORD, ENV_SERVER,
    ENV_TOKEN, ENV_USER, LOCAL_ARTIFICIAL_DELAY, WS_CONNECT_PATH, default_artificial_delay,
};
pub use connection_manager::{ConnectedCallback, ConnectionManager, MessageHandler, StateHandler};
pub use rpc_client::{ConnectError, RpcClient};

// Re-expose for simplicity
pub use bookmux::rpc::{ConnectionState, RpcClientError, RpcRequest, RpcResponse, TransportError};
