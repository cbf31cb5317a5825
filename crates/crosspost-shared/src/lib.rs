//! # Crosspost Shared
//!
//! Wire types of the HTTP API, usable by any client of it.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
