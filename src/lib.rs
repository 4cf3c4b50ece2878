//! Client-side entity cache and invalidation coordinator for a tutoring-center
//! admin console.
//!
//! Reads go through [`Query`] handles keyed by [`cache::QueryKey`]; writes go
//! through [`Mutation`] handles that, once the server confirms, stale every
//! dependent key listed in [`graph::DependencyGraph`]. The per-entity
//! functions in [`hooks`] wire both to the admin REST API through a
//! [`Session`].

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod logging;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testing;

pub use client::QueryClient;
pub use error::{Error, Result};
pub use mutation::{Mutation, MutationOptions, MutationStatus};
pub use query::{Query, QueryOptions, QueryState};
pub use session::Session;
