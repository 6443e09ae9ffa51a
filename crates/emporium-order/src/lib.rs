//! Emporium: Order service.
//!
//! Places orders from the caller's cart replica through a saga that reserves
//! stock in the local product replica, then reports the new stock levels on
//! `Order-Topic-Product` and the emptied cart on `Order-Topic-Cart`.

pub mod application;
pub mod domain;
