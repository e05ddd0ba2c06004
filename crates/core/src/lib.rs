//! Core domain types for the auction watcher and daily challenge bot.
//!
//! Everything in this crate is pure: no I/O, no async.

pub mod challenge;
pub mod clock;
pub mod currency;
pub mod filter;
pub mod listing;
pub mod matcher;
pub mod price;
pub mod retention;

pub use challenge::*;
pub use clock::*;
pub use currency::*;
pub use filter::*;
pub use listing::*;
pub use matcher::*;
pub use price::*;
pub use retention::*;
