//! Storage abstraction for session persistence.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::session::{Element, ParticipantId, Session, SessionId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations. `Send` so callers can spawn on it.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable home of session records.
///
/// Implementations can keep sessions in memory, on the filesystem, or in an
/// external database. The relay only relies on `find_by_id` and
/// `replace_elements`; the rest serves whoever manages session lifecycles.
pub trait SessionStore: Send + Sync {
    /// Create or overwrite a full session record.
    fn insert(&self, session: &Session) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a session by id.
    fn find_by_id(&self, id: &SessionId) -> BoxFuture<'_, StorageResult<Session>>;

    /// Replace the stored element sequence. Fails with `NotFound` if the
    /// session no longer exists.
    fn replace_elements(
        &self,
        id: &SessionId,
        elements: &[Element],
    ) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete a session. Deleting a missing session is not an error.
    fn delete(&self, id: &SessionId) -> BoxFuture<'_, StorageResult<()>>;

    /// All sessions owned by or shared with `participant`, newest first.
    fn list_for_participant(
        &self,
        participant: &ParticipantId,
    ) -> BoxFuture<'_, StorageResult<Vec<Session>>>;

    /// Load a session only if `participant` owns it or it is shared with them.
    ///
    /// Sessions the participant cannot see are reported as `NotFound`.
    fn find_for_participant(
        &self,
        id: &SessionId,
        participant: &ParticipantId,
    ) -> BoxFuture<'_, StorageResult<Session>> {
        let id = id.clone();
        let participant = participant.clone();
        Box::pin(async move {
            let session = self.find_by_id(&id).await?;
            if session.can_join(&participant) {
                Ok(session)
            } else {
                Err(StorageError::NotFound(id))
            }
        })
    }
}

/// Sort newest first, the order listings are returned in.
fn newest_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    // Simple blocking executor for tests; storage futures never wait on I/O readiness
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}
