//! Typed client for the Tally finance API.
//!
//! [`FinanceClient`] wraps the authenticated gateway from `tally-auth` with
//! one method per backend operation. Reads go through the shared
//! [`DataCache`](tally_auth::DataCache); every write invalidates the cached
//! queries it affects.

mod amount;
mod client;
mod error;
pub mod keys;
pub mod models;

#[cfg(test)]
mod tests;

pub use client::FinanceClient;
pub use error::{ApiError, ApiResult};
pub use models::*;
