//! WebSocket Session Management
//!
//! Everything between a browser socket and a live agent session:
//!
//! - `protocol`: the JSON frames exchanged with the client.
//! - `mode`: turns the client's config frame into a session plan.
//! - `translate`: maps agent events to client messages.
//! - `bridge`: relays both directions for the lifetime of one session.
//! - `session`: the Axum upgrade handler.

pub mod bridge;
pub mod mode;
pub mod protocol;
pub mod session;
pub mod translate;

pub use session::ws_handler;
