//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources handed to handlers and bridges.

use crate::config::Config;
use crate::registry::SessionRegistry;
use crate::ws::mode::ModeResolver;
use coach_core::agents::AgentCatalog;
use coach_core::runtime::AgentRuntime;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub resolver: ModeResolver,
    pub agents: Arc<AgentCatalog>,
    pub runtime: Arc<dyn AgentRuntime>,
}

impl AppState {
    pub fn new(config: Config, agents: AgentCatalog, runtime: Arc<dyn AgentRuntime>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(config.max_sessions)),
            resolver: ModeResolver::from_config(&config),
            agents: Arc::new(agents),
            runtime,
            config: Arc::new(config),
        }
    }
}
