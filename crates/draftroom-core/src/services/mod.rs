//! Typed services for the draft application.
//!
//! Each service builds the descriptors for one collection and decodes the
//! cached JSON into models.

pub mod draft;
pub mod league;

pub use draft::{DraftApi, InvalidationScope};
pub use league::LeagueApi;
