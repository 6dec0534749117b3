//! Transport layer for the remote draft service.
//!
//! This module provides the `Transport` seam, the reqwest-backed
//! `HttpTransport`, the `ApiError` taxonomy shared by every layer above, and
//! a scriptable `MockTransport` for tests.

pub mod error;
pub mod mock;
pub mod transport;

pub use error::ApiError;
pub use transport::{HttpTransport, Request, Transport};
