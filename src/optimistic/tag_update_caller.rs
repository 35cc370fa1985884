use crate::model::{TagId, TagUpdate};
use crate::optimistic::{MutationError, OptimisticMutation, TagEdit, TagTreeMirror};
use crate::rpc::RpcClientError;
use std::sync::{Mutex, PoisonError};

/// The one server operation optimistic tree edits depend on.
///
/// Implemented by the transport clients; tests substitute their own. `Ok`
/// means the server committed the write, and nothing past that write may
/// turn it into an error.
#[async_trait::async_trait]
pub trait TagUpdateCaller: Send + Sync {
    async fn put_tag_update(
        &self,
        tag_id: TagId,
        update: TagUpdate,
    ) -> Result<(), RpcClientError>;
}

/// Runs one edit through the apply, attempt, confirm-or-revert protocol.
///
/// The tree lock is only held while applying and while settling, never
/// across the request, so the host can render the pending marker meanwhile.
/// Edits refused locally return before any request is made. On success the
/// id of the edited tag is returned, for a host that wants to refetch it.
pub async fn commit_tag_edit<C>(
    caller: &C,
    tree: &Mutex<TagTreeMirror>,
    edit: TagEdit,
) -> Result<TagId, MutationError>
where
    C: TagUpdateCaller + ?Sized,
{
    let mut mutation = {
        let mut tree = tree.lock().unwrap_or_else(PoisonError::into_inner);
        OptimisticMutation::apply(&mut tree, edit)?
    };

    let result = caller
        .put_tag_update(mutation.tag_id(), mutation.update().clone())
        .await;

    let mut tree = tree.lock().unwrap_or_else(PoisonError::into_inner);
    mutation.settle(&mut tree, result)?;
    Ok(mutation.tag_id())
}
