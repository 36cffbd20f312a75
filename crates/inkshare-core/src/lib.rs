//! InkShare Core Library
//!
//! Session model and durable storage shared by the InkShare relay server.

pub mod session;
pub mod storage;

pub use session::{Access, Element, ParticipantId, Session, SessionError, SessionId, Snapshot};
pub use storage::{FileStorage, MemoryStorage, SessionStore, StorageError, StorageResult};
