//! Marketplace domain logic on top of the `model` entities.
//!
//! Every function takes any sea-orm connection (or, for multi-statement
//! changes, anything that can open a transaction), so handlers and tests
//! share the same code paths.

pub mod error;
pub mod passwords;
pub mod products;
pub mod profiles;
pub mod tokens;
pub mod users;
pub mod votes;

#[cfg(test)]
mod testing;

pub use error::{CatalogError, Result};
