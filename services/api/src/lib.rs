//! Live Sales Coach API Library Crate
//!
//! Configuration, the session registry, REST handlers, routing and the
//! WebSocket bridge between browser clients and live agent sessions. The
//! `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod router;
pub mod state;
pub mod ws;
