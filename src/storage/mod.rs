//! Storage Module
//!
//! This module provides the machinery underneath [`AgingMap`](crate::AgingMap):
//! a thread-safe, sharded key-value store and a background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ConcurrentStore                         │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! The store knows nothing about time. The sweeper knows nothing about the
//! store: it drives anything implementing [`Sweep`] at a fixed interval.

pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use engine::ConcurrentStore;
pub use expiry::{ExpirySweeper, Sweep, SweepReport};
