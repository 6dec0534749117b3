//! Query and mutation executors.
//!
//! Queries are declared with a [`QueryDescriptor`] (what to read and which
//! tags the result is filed under) and mutations with a
//! [`MutationDescriptor`] (what to write and which tags become stale). Both
//! run through one [`QueryClient`], the context object that owns the cache
//! for the session.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = QueryClient::from_config(&config)?;
//! let draft = QueryDescriptor::new("draft", "123").provides(Tag::new("Draft"));
//!
//! let mut view = client.subscribe::<Draft>(&draft);
//! view.settled().await;
//!
//! client
//!     .mutate(
//!         &MutationDescriptor::post("draft", "123")
//!             .action("pick")
//!             .with_param("name", "Alice")
//!             .invalidates(Tag::new("Draft")),
//!     )
//!     .await?;
//!
//! // The subscribed draft is already refetching.
//! let refreshed = view.settled().await;
//! ```

pub mod client;
pub mod descriptor;
pub mod mutation;
pub mod subscription;

pub use client::QueryClient;
pub use descriptor::{MutationDescriptor, QueryDescriptor};
pub use subscription::{QueryResult, QueryState, QuerySubscription};
