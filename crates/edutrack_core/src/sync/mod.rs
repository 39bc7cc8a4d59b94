//! Client-side optimistic synchronization.
//!
//! # Responsibility
//! - `intent`: closed set of user mutations.
//! - `engine`: pure local reduction plus the mirrored remote write.
//! - `subscription`: typed collection snapshots with a loading flag.
//! - `writer`: ordered fire-and-forget write queue.
//! - `store`: session lifecycle and the single source of truth.
//!
//! # Data flow
//! intent -> `OptimisticStore::dispatch` -> `engine::reduce` (local) ->
//! `WriteQueue::submit` (remote, not awaited) -> gateway snapshot ->
//! collection replaced.

pub mod engine;
pub mod intent;
pub mod store;
pub mod subscription;
pub mod writer;
