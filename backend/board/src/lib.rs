//! # Board
//!
//! Shared leaderboard logic used by both the API server and the `process` CLI.
//!
//! ## Layout
//!
//! - `ranking`: standard competition ranking over totals-descending entries
//! - `chunk`: greedy packing of formatted lines into Discord-sized messages
//! - `format`: Discord markdown for the posted leaderboard
//! - `store`: persistence seam, backed by Redis (`database`) or in-process (`memory`)
//! - `discord`: thin REST client for user lookups and channel messages
//! - `profiles`: display name / avatar refresh jobs
//! - `publish`: format, chunk and post a leaderboard, then record the update
//!
//! ## Notes
//!
//! ### Ranks
//! Ties share the lower ordinal and the next distinct total resumes at its
//! position, so `[10, 10, 7, 3]` ranks as `[1, 1, 3, 4]`.
//!
//! ### Message size
//! Discord caps message content at 2000 characters. We pack at 1950 to leave
//! room for the newline joins.

pub mod chunk;
pub mod config;
pub mod database;
pub mod discord;
pub mod error;
pub mod format;
pub mod memory;
pub mod models;
pub mod profiles;
pub mod publish;
pub mod ranking;
pub mod store;

pub use chunk::chunk_text;
pub use error::BoardError;
pub use ranking::{RankedEntry, Scored, assign_ranks, assign_ranks_checked};
pub use store::LeggyStore;
