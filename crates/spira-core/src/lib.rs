//! spira-core library.
//!
//! Mirrors the requirements, tasks and incidents assigned to a SpiraPlan user
//! into a two-level tree (category headers over work items) and keeps it
//! fresh.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for configuration and glue code,
//!   `thiserror` enums for errors callers match on.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod provider;
pub mod schedule;
pub mod sync;
pub mod tree;

pub use model::artifact::{Artifact, Category};
pub use provider::SpiraProvider;
pub use tree::TreeSnapshot;
