//! # Adapters Layer
//!
//! HTTP implementations of the outbound ports.

mod evolution_client;
mod http;
mod workflow_client;

pub use evolution_client::EvolutionClient;
pub use workflow_client::WorkflowClient;
