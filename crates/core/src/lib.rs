//! Shared building blocks for the live sales coach: the provider-neutral
//! live-session contract, the agent catalog and personas, and the coaching
//! tools the agent reports through.

pub mod agents;
pub mod live;
pub mod objections;
pub mod personas;
pub mod prompts;
pub mod runtime;
pub mod tools;
