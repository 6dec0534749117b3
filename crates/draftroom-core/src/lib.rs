//! Client-side data layer for the draftroom fantasy draft service.
//!
//! Reads go through a normalized cache keyed by `(collection, id)`, with
//! concurrent requests for the same entity collapsed into one. Writes declare
//! the tags they make stale, and every subscribed entry filed under those
//! tags is refetched before the write returns.
//!
//! - [`api`]: HTTP transport and the error type shared by every layer
//! - [`cache`]: entity cache and tag index
//! - [`query`]: query and mutation executors
//! - [`services`]: typed draft and league operations

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod query;
pub mod services;

pub use api::{ApiError, HttpTransport, Request, Transport};
pub use cache::{EntryStatus, QuerySnapshot, ResourceId, Tag};
pub use config::{ClientConfig, CredentialsMode, QueryConfig};
pub use query::{
    MutationDescriptor, QueryClient, QueryDescriptor, QueryResult, QueryState, QuerySubscription,
};
pub use services::{DraftApi, InvalidationScope, LeagueApi};
