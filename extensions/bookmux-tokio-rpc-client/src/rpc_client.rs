use crate::client_config::{ClientConfig, ConfigError};
use crate::connection_manager::{ConnectionManager, lock};
use bookmux::constants::{
    BOOKMARKS_PATH, SHAPE_FLAT, SHAPE_SINGLE, TAGS_PATH, VALUE_ALLOW_NEW, VALUE_PATTERN,
    VALUE_SHAPE, VALUE_TAG_ID, VALUE_URL,
};
use bookmux::model::{
    Bookmark, BookmarkCreated, BookmarkData, BookmarkId, NewTag, TagCreated, TagId, TagMatch,
    TagNode, TagUpdate,
};
use bookmux::optimistic::TagUpdateCaller;
use bookmux::rpc::{
    ConnectionState, RequestCorrelator, RpcClientError, RpcRequest, RpcResponse,
    RpcResultStatus, TransportError,
};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// `/tags` or `/tags/{path_or_id}`; surrounding slashes are ignored.
fn tag_path(path_or_id: &str) -> String {
    match path_or_id.trim_matches('/') {
        "" => TAGS_PATH.to_string(),
        rest => format!("{TAGS_PATH}/{rest}"),
    }
}

fn bookmark_path(id: BookmarkId) -> String {
    format!("{BOOKMARKS_PATH}/{id}")
}

/// Typed bookmark and tag operations over one multiplexed connection.
///
/// Each call allocates a request id from the client's [`RequestCorrelator`],
/// writes the envelope to the current [`ConnectionManager`] and waits for the
/// response carrying the same id. Any number of calls may be in flight; they
/// complete in whatever order the server answers.
pub struct RpcClient {
    config: ClientConfig,
    correlator: Arc<Mutex<RequestCorrelator>>,
    connection: RwLock<Arc<ConnectionManager>>,
}

impl RpcClient {
    /// Starts connecting and returns without waiting for the handshake.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let connection = Self::open_connection(&config)?;
        Ok(Self::with_connection(config, connection))
    }

    /// Connects and waits for the connection to open.
    pub async fn connect(config: ClientConfig) -> Result<Self, ConnectError> {
        let client = Self::new(config)?;
        client.wait_open().await?;
        Ok(client)
    }

    /// Builds a client over an existing connection.
    pub fn with_connection(config: ClientConfig, connection: ConnectionManager) -> Self {
        let correlator = Arc::new(Mutex::new(RequestCorrelator::new()));
        Self::bind(&connection, &correlator);

        Self {
            config,
            correlator,
            connection: RwLock::new(Arc::new(connection)),
        }
    }

    fn open_connection(config: &ClientConfig) -> Result<ConnectionManager, ConfigError> {
        Ok(ConnectionManager::connect(
            config.handshake_request()?,
            config.server.clone(),
            config.artificial_delay,
        ))
    }

    fn bind(connection: &ConnectionManager, correlator: &Arc<Mutex<RequestCorrelator>>) {
        let inbound = correlator.clone();
        connection.on_message(move |frame| {
            // Stale ids are logged by the correlator.
            let _ = lock(&inbound).dispatch_frame(frame);
        });

        let stranded = correlator.clone();
        let label = connection.label().to_string();
        connection.on_close(move || {
            let count = lock(&stranded).outstanding_len();
            if count > 0 {
                tracing::warn!(
                    "[{}] connection closed with {} requests still pending; they will not complete",
                    label,
                    count
                );
            }
        });
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The connection currently carrying requests.
    pub fn connection(&self) -> Arc<ConnectionManager> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection().state()
    }

    pub fn is_open(&self) -> bool {
        self.connection().is_open()
    }

    pub async fn wait_open(&self) -> Result<(), TransportError> {
        self.connection().wait_open().await
    }

    /// See [`ConnectionManager::on_connected`].
    pub fn on_connected<F>(&self, invoke_if_already_connected: bool, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.connection()
            .on_connected(invoke_if_already_connected, callback);
    }

    /// Moves the correlator onto `connection` and closes the previous one.
    ///
    /// Callbacks still waiting for the previous connection to open are carried
    /// over. Requests that were in flight on the previous connection stay
    /// pending.
    pub fn rebind(&self, connection: ConnectionManager) {
        Self::bind(&connection, &self.correlator);
        let connection = Arc::new(connection);

        let previous = {
            let mut current = self
                .connection
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, connection.clone())
        };

        for callback in previous.take_when_connected() {
            connection.on_connected(true, callback);
        }

        tracing::info!(
            "[{}] rebound client to a new connection",
            connection.label()
        );
        previous.close();
    }

    /// Opens a fresh connection with the client's configuration and rebinds to it.
    pub fn reconnect(&self) -> Result<(), ConfigError> {
        let connection = Self::open_connection(&self.config)?;
        self.rebind(connection);
        Ok(())
    }

    pub fn close(&self) {
        self.connection().close();
    }

    /// Sends `request` and waits for its response, whatever the status.
    pub async fn call(&self, request: RpcRequest) -> Result<RpcResponse, RpcClientError> {
        let connection = self.connection();
        let (done_tx, done_rx) = oneshot::channel::<Result<RpcResponse, RpcClientError>>();

        {
            let mut correlator = lock(&self.correlator);
            correlator.send(
                request,
                |envelope| connection.send_envelope(&envelope),
                move |result| {
                    let _ = done_tx.send(result);
                },
            )?;
        }

        done_rx.await.map_err(|_| RpcClientError::Aborted)?
    }

    /// Sends `request` and decodes a successful body into `T`.
    ///
    /// Any status other than 200 becomes [`RpcClientError::Application`]
    /// carrying the server's body.
    pub async fn call_typed<T>(&self, request: RpcRequest) -> Result<T, RpcClientError>
    where
        T: DeserializeOwned,
    {
        let response = self.call(request).await?;

        match RpcResultStatus::from_status(response.status) {
            RpcResultStatus::Success => Ok(serde_json::from_value(response.body)?),
            RpcResultStatus::Fail(status) => Err(RpcClientError::Application {
                status,
                body: response.body,
            }),
        }
    }

    /// The whole tag tree under the user's synthetic root.
    pub async fn get_tags_tree(&self) -> Result<TagNode, RpcClientError> {
        tracing::debug!("get_tags_tree()");
        self.call_typed(RpcRequest::get(TAGS_PATH)).await
    }

    pub async fn get_tag(&self, path_or_id: &str) -> Result<TagNode, RpcClientError> {
        tracing::debug!("get_tag({:?})", path_or_id);
        self.call_typed(RpcRequest::get(tag_path(path_or_id)).with_value(VALUE_SHAPE, SHAPE_SINGLE))
            .await
    }

    /// Tags matching `pattern`, flat. With `allow_new`, the server may add a
    /// suggestion for tags that do not exist yet.
    pub async fn get_tags_by_pattern(
        &self,
        pattern: &str,
        allow_new: bool,
    ) -> Result<Vec<TagMatch>, RpcClientError> {
        tracing::debug!("get_tags_by_pattern({:?}, {})", pattern, allow_new);

        let mut request = RpcRequest::get(TAGS_PATH)
            .with_value(VALUE_SHAPE, SHAPE_FLAT)
            .with_value(VALUE_PATTERN, pattern);
        if allow_new {
            request = request.with_value(VALUE_ALLOW_NEW, "1");
        }

        self.call_typed(request).await
    }

    /// Creates a tag under `parent_path` and returns it as stored.
    pub async fn add_tag(&self, parent_path: &str, tag: NewTag) -> Result<TagNode, RpcClientError> {
        tracing::debug!("add_tag({:?}, {:?})", parent_path, tag);

        let body = serde_json::to_value(&tag)?;
        let created: TagCreated = self
            .call_typed(RpcRequest::post(tag_path(parent_path)).with_body(body))
            .await?;

        self.get_tag(&created.tag_id.to_string()).await
    }

    /// Applies `update` and returns the tag as stored afterwards.
    ///
    /// A path is resolved to an id first, since a rename or move changes it.
    pub async fn update_tag(
        &self,
        path_or_id: &str,
        update: TagUpdate,
    ) -> Result<TagNode, RpcClientError> {
        tracing::debug!("update_tag({:?}, {:?})", path_or_id, update);

        let tag_id: TagId = match path_or_id.trim_matches('/').parse() {
            Ok(tag_id) => tag_id,
            Err(_) => self.get_tag(path_or_id).await?.id,
        };

        self.put_tag_update(tag_id, update).await?;
        self.get_tag(&tag_id.to_string()).await
    }

    /// Writes `update` to tag `tag_id` without reading the tag back.
    pub async fn put_tag_update(
        &self,
        tag_id: TagId,
        update: TagUpdate,
    ) -> Result<(), RpcClientError> {
        let body = serde_json::to_value(&update)?;
        self.call_typed::<serde_json::Value>(
            RpcRequest::put(tag_path(&tag_id.to_string())).with_body(body),
        )
        .await?;
        Ok(())
    }

    /// Bookmarks carrying every tag in `tag_ids`.
    pub async fn get_tagged_bookmarks<I>(&self, tag_ids: I) -> Result<Vec<Bookmark>, RpcClientError>
    where
        I: IntoIterator<Item = TagId>,
    {
        let tag_ids: Vec<String> = tag_ids.into_iter().map(|id| id.to_string()).collect();
        tracing::debug!("get_tagged_bookmarks({:?})", tag_ids);

        self.call_typed(RpcRequest::get(BOOKMARKS_PATH).with_value(VALUE_TAG_ID, tag_ids))
            .await
    }

    pub async fn get_bookmarks_by_url(&self, url: &str) -> Result<Vec<Bookmark>, RpcClientError> {
        tracing::debug!("get_bookmarks_by_url({:?})", url);
        self.call_typed(
            RpcRequest::get(BOOKMARKS_PATH).with_value(VALUE_URL, vec![url.to_string()]),
        )
        .await
    }

    pub async fn get_bookmark_by_id(&self, id: BookmarkId) -> Result<Bookmark, RpcClientError> {
        tracing::debug!("get_bookmark_by_id({})", id);
        self.call_typed(RpcRequest::get(bookmark_path(id))).await
    }

    pub async fn add_bookmark(&self, data: BookmarkData) -> Result<Bookmark, RpcClientError> {
        tracing::debug!("add_bookmark({:?})", data);

        let body = serde_json::to_value(&data)?;
        let created: BookmarkCreated = self
            .call_typed(RpcRequest::post(BOOKMARKS_PATH).with_body(body))
            .await?;

        self.get_bookmark_by_id(created.bookmark_id).await
    }

    pub async fn update_bookmark(
        &self,
        id: BookmarkId,
        data: BookmarkData,
    ) -> Result<Bookmark, RpcClientError> {
        tracing::debug!("update_bookmark({}, {:?})", id, data);

        let body = serde_json::to_value(&data)?;
        self.call_typed::<serde_json::Value>(RpcRequest::put(bookmark_path(id)).with_body(body))
            .await?;

        self.get_bookmark_by_id(id).await
    }
}

#[async_trait::async_trait]
impl TagUpdateCaller for RpcClient {
    async fn put_tag_update(
        &self,
        tag_id: TagId,
        update: TagUpdate,
    ) -> Result<(), RpcClientError> {
        RpcClient::put_tag_update(self, tag_id, update).await
    }
}
