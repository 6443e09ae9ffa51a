//! Emporium: Shopping cart service.
//!
//! Owns one cart per user. Line items are validated against a local replica
//! of the product catalogue, fed from `Product-Topic`. Carts emptied by the
//! order saga arrive back on `Order-Topic-Cart`.

pub mod application;
pub mod domain;
