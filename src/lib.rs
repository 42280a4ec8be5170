//! # Commit Viewer - Fault-tolerant Commit History Retrieval
//!
//! Retrieves the complete commit history of a hosted repository by name and
//! keeps the result in a local store for later listing.
//!
//! ## Overview
//!
//! Retrieval goes through a chain of pluggable loaders. The hosting API loader
//! walks the paginated commits endpoint; when it fails for any reason the
//! clone loader makes a no-checkout clone into a scratch directory and parses
//! `git log`. Both produce the same [`types::CommitRecord`] shape, newest first.
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────────┐
//!            │  CommitViewerClient  │  fetch / refresh / list
//!            └──────────┬───────────┘
//!                       │
//!            ┌──────────▼───────────┐      ┌─────────────┐
//!            │   CommitRetriever    ├─────►│ CommitStore │ (JSON file)
//!            └──────────┬───────────┘      └─────────────┘
//!            first      │      fallback
//!        ┌──────────────┴──────────────┐
//! ┌──────▼──────────┐        ┌─────────▼─────────┐
//! │ RemoteApiLoader │        │ LocalCloneLoader  │
//! │ (paginated GET) │        │ (clone -n + log)  │
//! └─────────────────┘        └───────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`loader`]: the `CommitLoader` trait and its API and clone implementations
//! - [`retriever`]: fallback orchestration producing a `RetrievalResult`
//! - [`store`]: persistent store of retrieved histories
//! - [`client`]: library facade used by the CLI
//! - [`config`]: configuration management with environment variable support
//! - [`types`]: commit records and result envelopes
//! - [`error`]: error types and result aliases
//! - [`paths`]: platform directory helpers
//!
//! ## Usage Example
//!
//! ```no_run
//! use commit_viewer::client::CommitViewerClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CommitViewerClient::new()?;
//!     let outcome = client.fetch("rust-lang/log").await?;
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```

/// Library facade combining retrieval and persistence
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Error types and utilities
pub mod error;

/// Commit loaders (hosting API and local clone)
pub mod loader;

/// Platform directory computation
pub mod paths;

/// Loader chain orchestration with fallback
pub mod retriever;

/// Persistent store of retrieved commit histories
pub mod store;

/// Commit records and retrieval envelopes
pub mod types;

pub use client::{CommitViewerClient, FetchOutcome};
pub use config::Config;
pub use error::{LoadError, ViewerError};
pub use loader::{CommitLoader, LocalCloneLoader, RemoteApiLoader};
pub use retriever::{CommitRetriever, EmptyHistoryPolicy};
pub use types::{CommitRecord, RetrievalResult};
