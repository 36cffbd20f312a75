//! InkShare WebSocket Relay Server
//!
//! Relays drawing updates between participants joined to the same session,
//! keeping the latest state of every session in memory and writing it behind
//! to storage.
//!
//! ## Protocol
//!
//! Clients connect to `/ws` with an `Authorization: Bearer <token>` header and
//! exchange JSON messages:
//! ```json
//! { "type": "joinCanvas", "canvasId": "<session-id>" }
//! { "type": "drawingUpdate", "canvasId": "<session-id>", "elements": [ ... ] }
//! ```
//!
//! Whatever deletes sessions should call [`SyncEngine::forget_session`] so
//! the relay drops its cached state and room for them.

pub mod auth;
pub mod cache;
pub mod config;
pub mod engine;
pub mod flush;
pub mod protocol;
pub mod registry;
pub mod ws;

#[cfg(test)]
mod testing;

pub use engine::{JoinError, SyncEngine};
