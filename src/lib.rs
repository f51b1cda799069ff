//! # agemap - A Concurrent Map With Per-Entry Expiry
//!
//! `agemap` is an in-process, concurrency-safe key-value map where every entry
//! carries its own time-to-live. Expired entries are invisible to every read
//! and are reclaimed without any bookkeeping by the caller.
//!
//! ## Features
//!
//! - **Per-entry TTL**: Each `store` picks its own lifetime
//! - **Sharded Storage**: 64 independently locked shards reduce contention
//! - **Atomic load-or-store**: Racing callers agree on a single winner
//! - **Lazy + Active Eviction**: Reads drop what they find expired; an optional
//!   background task sweeps a share of the table on a fixed interval
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              AgingMap                                   │
//! │                                                                         │
//! │   store / load / load_with_deadline / load_or_store / delete / range    │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                     ┌──────────────────────────────────────────────┐   │
//! │                     │     ConcurrentStore<K, AgingValue<V>>        │   │
//! │                     │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │                     │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │                     │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task, optional)          │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use agemap::AgingMap;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Sweeps every second, inspecting half of the table per cycle
//!     let map = AgingMap::new();
//!
//!     map.store("session", "token123", Duration::from_secs(1));
//!     assert_eq!(map.load("session"), Some("token123"));
//!
//!     tokio::time::sleep(Duration::from_secs(2)).await;
//!     assert_eq!(map.load("session"), None);
//! }
//! ```
//!
//! Maps built with [`AgingMap::lazy`] need no runtime at all; they only
//! evict on access.
//!
//! ## Eviction
//!
//! Entries expire in two ways:
//! 1. **Lazy**: `load`, `load_with_deadline`, `load_or_store` and `range`
//!    delete the expired entries they come across
//! 2. **Active**: A background task periodically inspects `delete_scale` of the
//!    table and deletes every expired entry it sees
//!
//! A sweep cycle is a partial, best-effort scan. Across cycles it works its
//! way around the whole table, so long-lived garbage is eventually reclaimed
//! even if nobody reads it again.
//!
//! ## Module Overview
//!
//! - [`map`]: The `AgingMap` itself
//! - [`value`]: Values paired with their lifetime
//! - [`storage`]: Sharded store and background sweeper
//! - [`config`]: Eviction modes and sweep settings
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod map;
pub mod storage;
pub mod value;

// Re-export commonly used types for convenience
pub use config::{EvictionMode, SweepConfig};
pub use error::{ConfigError, Error, Result};
pub use map::{AgingMap, AgingStats};
pub use storage::{ConcurrentStore, ExpirySweeper, SweepReport};
pub use value::AgingValue;

/// Version of agemap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
