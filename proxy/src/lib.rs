//! Evento proxy.
//!
//! Sits between cátedra and the backend:
//!
//! - serves cátedra's seat maps from its Redis ([`asientos`], [`server`])
//! - turns cátedra's Kafka change notifications into backend catalog syncs
//!   ([`consumer`], [`notifier`])

pub mod asientos;
pub mod config;
pub mod consumer;
pub mod notifier;
pub mod server;

pub use config::Config;
pub use notifier::BackendNotifier;
pub use server::{AppState, build_router};
