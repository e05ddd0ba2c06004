//! External data sources: the server auction feed and the daily coding
//! challenge endpoint.

pub mod auction;
pub mod challenge;
pub mod error;
pub mod rest;

pub use auction::*;
pub use challenge::*;
pub use error::*;
