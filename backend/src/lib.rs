//! Evento ticketing backend.
//!
//! Sells seats of events published by the cátedra service. A buyer opens a
//! purchase session for one event, holds up to four seats through cátedra,
//! names the attendees and confirms the sale. Sessions expire after a period
//! of inactivity.
//!
//! # Layout
//!
//! - [`config`]: environment configuration
//! - [`clients`]: HTTP clients for cátedra and the seat proxy
//! - [`cache`]: Redis session cache
//! - [`services`]: application services on top of the `evento-core` ports
//! - [`api`]: axum handlers and the authenticated-caller extractors
//! - [`server`]: state, router and probes

pub mod api;
pub mod cache;
pub mod clients;
pub mod config;
pub mod server;
pub mod services;

pub use config::Config;
pub use server::{AppState, Ports, build_router};
