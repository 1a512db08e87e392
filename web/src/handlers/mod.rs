//! HTTP handlers shared by the evento services.

pub mod health;

pub use health::{health_check, render_metrics};
