//! HTTP API modules

pub mod error;
pub mod wizard;

pub use error::ApiError;
