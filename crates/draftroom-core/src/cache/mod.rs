//! In-memory entity cache and tag index.
//!
//! `EntityCache` holds one `CacheEntry` per `ResourceId` with its
//! loading/error/success state, and `TagIndex` files entries under `Tag`s so
//! a mutation can mark every dependent entry stale in one step.

pub mod entry;
pub mod store;
pub mod tags;

pub use entry::{CacheEntry, EntryStatus, QuerySnapshot, RequestId, ResourceId};
pub use store::EntityCache;
pub use tags::{Tag, TagIndex};
