//! Data models for the draft service.
//!
//! - `Draft`, `Pick`: a draft and the players picked so far
//! - `League`, `Team`, `Player`: league setup and remaining draft order

pub mod draft;
pub mod league;

pub use draft::{Draft, Pick};
pub use league::{League, Player, Team};
