//! Commerce Platform Project Sync
//!
//! Copies the resources of one commerce platform project into another.

pub mod client;
pub mod commands;
pub mod config;
pub mod engine;
pub mod last_sync;
pub mod reference;
pub mod resource;
pub mod runner;
pub mod syncers;

pub use client::{CtpClient, CtpError, RetryPolicy};
pub use config::Config;
pub use engine::{SyncEngine, SyncError, SyncOptions, SyncStatistics, UpsertEngine};
pub use resource::ResourceType;
pub use runner::{RunError, RunOptions, SyncReport, SyncRunner};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
