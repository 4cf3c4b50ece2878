//! In-memory cache of server responses.
//!
//! This module provides the storage half of the coordinator:
//! - Query keys and wildcard patterns (`key`)
//! - The key registry every call site builds keys through (`keys`)
//! - The shared store with freshness tracking, subscriptions and per-key
//!   in-flight fetch bookkeeping (`store`)
//!
//! Entries live until the store is cleared; nothing is evicted by time.

mod key;
pub mod keys;
mod store;

pub use key::{Id, KeyPattern, Param, QueryKey, Resource};
pub use store::{
  CacheEntry, CacheStore, FetchFuture, FetchTicket, Fetcher, Invalidation, SharedFetch,
  Subscription,
};
